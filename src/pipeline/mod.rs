//! Request orchestration: `CacheCheck → Discover → Ingest → Detect → Persist`.
//!
//! Ingest covers ranking, geocoding and the snapshot fetch. Failures of a single
//! address in that stage drop the address and are counted in the
//! [`PipelineReport`]. Discovery and detection failures abort the request. The
//! working area is cleared on every path out of the run.
//!
//! Nothing partial is ever cached: a request that fails or ends empty leaves the
//! cache untouched, so the next identical request starts from scratch.

pub mod error;
pub mod report;

#[cfg(test)]
mod tests;

pub use error::{PipelineError, PipelineResult};
pub use report::{PipelineOutcome, PipelineReport, PipelineStage};

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::constants::DEFAULT_MAX_CONCURRENCY;
use crate::detection::{DetectionAdapter, encode_base64};
use crate::discovery::AddressSource;
use crate::geocode::Geocoder;
use crate::hashing::hash_address;
use crate::imagery::{ImageryFetcher, WorkingArea};
use crate::ranking::{MAX_PANEL_COUNT_FIELD, RankingFilter};
use crate::types::{Address, CacheEntry, Candidate, CoordinateRecord, LocationQuery, ResponseRecord};

/// A selected address whose snapshot is on disk.
struct Fetched {
    address: Address,
    record: CoordinateRecord,
    image: Vec<u8>,
}

enum Ingested {
    Fetched(Fetched),
    NoMatch,
    GeocodeFailed,
    ImageryFailed,
}

/// Runs one location query end to end.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    source: Arc<dyn AddressSource>,
    ranking: RankingFilter,
    geocoder: Arc<dyn Geocoder>,
    imagery: ImageryFetcher,
    detection: DetectionAdapter,
    cache: ResultCache,
    scratch_root: PathBuf,
    concurrency: usize,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("ranking", &self.ranking)
            .field("cache", &self.cache)
            .field("scratch_root", &self.scratch_root)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn AddressSource>,
        ranking: RankingFilter,
        geocoder: Arc<dyn Geocoder>,
        imagery: ImageryFetcher,
        detection: DetectionAdapter,
        cache: ResultCache,
    ) -> Self {
        Self {
            source,
            ranking,
            geocoder,
            imagery,
            detection,
            cache,
            scratch_root: std::env::temp_dir(),
            concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Parent directory for per-request working areas.
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Max in-flight geocode+fetch calls.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[instrument(skip(self), fields(location = %query))]
    pub async fn run(&self, query: &LocationQuery) -> PipelineResult<PipelineOutcome> {
        let key = CacheKey::from(query);
        let mut report = PipelineReport::default();

        report.enter(PipelineStage::CacheCheck);
        if let Some(entry) = self.cached(&key).await {
            info!(addresses = entry.len(), "Cache hit");
            return Ok(PipelineOutcome::CacheHit(entry));
        }

        report.enter(PipelineStage::Discover);
        let addresses = self.source.discover(query).await?;
        report.discovered = addresses.len();
        if addresses.is_empty() {
            info!("No addresses discovered");
            return Ok(PipelineOutcome::Empty { report });
        }

        report.enter(PipelineStage::Ingest);
        let ranked = self.ranking.rank(&addresses).await;
        report.duplicates = ranked.duplicates;
        report.unscored = ranked.unscored;
        report.scoring_failures = ranked.failures;
        report.selected = ranked.candidates.len();
        if ranked.candidates.is_empty() {
            info!(discovered = report.discovered, "No address could be scored");
            return Ok(PipelineOutcome::Empty { report });
        }

        let area = WorkingArea::create_in(&self.scratch_root)?;
        let result = self.process(ranked.candidates, &area, &mut report).await;
        if let Err(e) = area.close() {
            warn!(error = %e, "Failed to clear working area");
        }

        let Some(entry) = result? else {
            info!(
                dropped = report.dropped_after_selection(),
                "No address survived ingestion"
            );
            return Ok(PipelineOutcome::Empty { report });
        };

        report.enter(PipelineStage::Persist);
        match self.cache.write(&key, &entry).await {
            Ok(()) => report.cache_written = true,
            Err(e) => warn!(error = %e, "Cache write failed; returning uncached result"),
        }

        info!(
            discovered = report.discovered,
            selected = report.selected,
            detected = report.detected,
            dropped = report.dropped_after_selection(),
            cached = report.cache_written,
            "Pipeline complete"
        );
        Ok(PipelineOutcome::Completed { entry, report })
    }

    /// Cached entry for `key`. Unreadable or corrupt entries count as a miss.
    async fn cached(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.cache.exists(key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(error = %e, "Cache existence check failed; treating as miss");
                return None;
            }
        }

        match self.cache.read(key).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Cached entry unreadable; treating as miss");
                None
            }
        }
    }

    /// Geocodes, fetches and detects; `None` when no address made it through.
    async fn process(
        &self,
        candidates: Vec<Candidate>,
        area: &WorkingArea,
        report: &mut PipelineReport,
    ) -> PipelineResult<Option<CacheEntry>> {
        let ingested: Vec<Ingested> = stream::iter(candidates)
            .map(|candidate| self.ingest(candidate, area))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(ingested.len());
        for item in ingested {
            match item {
                Ingested::Fetched(f) => fetched.push(f),
                Ingested::NoMatch => report.geocode_no_match += 1,
                Ingested::GeocodeFailed => report.geocode_failures += 1,
                Ingested::ImageryFailed => report.imagery_failures += 1,
            }
        }
        if fetched.is_empty() {
            return Ok(None);
        }

        report.enter(PipelineStage::Detect);
        let images: Vec<Vec<u8>> = fetched.iter().map(|f| f.image.clone()).collect();
        let results = self.detection.detect(&images).await?;

        let mut entry = CacheEntry::new();
        for (item, result) in fetched.into_iter().zip(results) {
            match self.detection.render(&item.image, &result) {
                Ok(annotated) => {
                    debug!(
                        key = item.record.hash.short(),
                        coords = ?item.record.coords,
                        max_panels = ?item.record.solar_info.get(MAX_PANEL_COUNT_FIELD),
                        detections = result.len(),
                        "Address annotated"
                    );
                    entry.insert(
                        item.address,
                        ResponseRecord {
                            has_solar: result.has_solar(),
                            has_pool: result.has_pool(),
                            base64_image: encode_base64(&annotated),
                        },
                    );
                }
                Err(e) => {
                    warn!(
                        key = item.record.hash.short(),
                        coords = ?item.record.coords,
                        error = %e,
                        "Dropping address after render failure"
                    );
                    report.render_failures += 1;
                }
            }
        }
        report.detected = entry.len();

        Ok((!entry.is_empty()).then_some(entry))
    }

    async fn ingest(&self, candidate: Candidate, area: &WorkingArea) -> Ingested {
        let Candidate {
            address,
            solar_info,
            ..
        } = candidate;
        let mut record = CoordinateRecord {
            coords: None,
            solar_info,
            hash: hash_address(&address),
        };

        let coords = match self.geocoder.geocode(&address).await {
            Ok(coords) => coords,
            Err(e) => {
                debug!(%address, error = %e, "Geocoding failed, dropping address");
                return if e.is_no_match() {
                    Ingested::NoMatch
                } else {
                    Ingested::GeocodeFailed
                };
            }
        };
        record.coords = Some(coords);

        match self.imagery.fetch(coords, &record.hash, area).await {
            Ok(image) => Ingested::Fetched(Fetched {
                address,
                record,
                image,
            }),
            Err(e) => {
                debug!(key = record.hash.short(), error = %e, "Snapshot fetch failed, dropping address");
                Ingested::ImageryFailed
            }
        }
    }
}
