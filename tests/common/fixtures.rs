//! Mock providers seeded with a San Jose (95123) neighbourhood.

use std::sync::Arc;

use solarscan::cache::{LocalBlobStore, ResultCache};
use solarscan::detection::{DetectionAdapter, DetectionResult, MockDetector};
use solarscan::discovery::MockAddressSource;
use solarscan::geocode::MockGeocoder;
use solarscan::imagery::{ImageryFetcher, MockImageryProvider};
use solarscan::pipeline::PipelineOrchestrator;
use solarscan::ranking::{MockSolarScorer, RankingFilter};
use solarscan::types::LocationQuery;
use solarscan::{POOL_LABEL, SOLAR_LABEL};
use tempfile::TempDir;

/// `(address, max panel count, lat, lon)`.
pub const SAN_JOSE: [(&str, f64, f64, f64); 7] = [
    ("5821 Santa Teresa Boulevard San Jose CA", 48.0, 37.2341, -121.8102),
    ("101 Blossom Hill Road San Jose CA", 22.0, 37.2512, -121.8325),
    ("6140 Snell Avenue San Jose CA", 61.0, 37.2489, -121.8367),
    ("244 Cottle Road San Jose CA", 35.0, 37.2395, -121.8021),
    ("5900 Lean Avenue San Jose CA", 17.0, 37.2453, -121.8198),
    ("433 Martinvale Lane San Jose CA", 54.0, 37.2427, -121.8214),
    ("18 Chynoweth Avenue San Jose CA", 29.0, 37.2561, -121.8512),
];

pub fn san_jose_query() -> LocationQuery {
    LocationQuery::new("95123", "San Jose", "CA")
}

pub fn san_jose_addresses() -> Vec<String> {
    SAN_JOSE.iter().map(|(a, ..)| a.to_string()).collect()
}

/// The five best-scoring addresses, sorted by address.
pub fn expected_top_five() -> Vec<String> {
    let mut rows = SAN_JOSE.to_vec();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut top: Vec<String> = rows.iter().take(5).map(|(a, ..)| a.to_string()).collect();
    top.sort();
    top
}

pub fn scorer() -> MockSolarScorer {
    SAN_JOSE
        .iter()
        .fold(MockSolarScorer::new(), |s, (a, metric, ..)| s.with_metric(*a, *metric))
}

pub fn geocoder() -> MockGeocoder {
    SAN_JOSE
        .iter()
        .fold(MockGeocoder::new(), |g, (a, _, lat, lon)| g.with_coords(*a, *lat, *lon))
}

pub fn mixed_detector() -> MockDetector {
    MockDetector::per_image(vec![
        DetectionResult {
            labels: vec![SOLAR_LABEL],
            scores: vec![0.81],
            boxes: vec![[3.0, 4.0, 18.0, 16.0]],
        },
        DetectionResult::default(),
        DetectionResult {
            labels: vec![SOLAR_LABEL, POOL_LABEL],
            scores: vec![0.64, 0.47],
            boxes: vec![[1.0, 1.0, 12.0, 9.0], [14.0, 15.0, 28.0, 30.0]],
        },
    ])
}

/// Handles on every mock so tests can count external calls.
pub struct Mocks {
    pub source: Arc<MockAddressSource>,
    pub scorer: Arc<MockSolarScorer>,
    pub geocoder: Arc<MockGeocoder>,
    pub imagery: Arc<MockImageryProvider>,
    pub detector: Arc<MockDetector>,
}

impl Mocks {
    pub fn new(
        source: MockAddressSource,
        scorer: MockSolarScorer,
        geocoder: MockGeocoder,
        detector: MockDetector,
    ) -> Self {
        Self {
            source: Arc::new(source),
            scorer: Arc::new(scorer),
            geocoder: Arc::new(geocoder),
            imagery: Arc::new(MockImageryProvider::new()),
            detector: Arc::new(detector),
        }
    }

    pub fn san_jose() -> Self {
        Self::new(
            MockAddressSource::with_addresses(san_jose_addresses()),
            scorer(),
            geocoder(),
            mixed_detector(),
        )
    }

    pub fn external_calls(&self) -> usize {
        self.source.calls()
            + self.scorer.calls()
            + self.geocoder.calls()
            + self.imagery.calls()
            + self.detector.calls()
    }

    pub fn orchestrator(&self, cache: ResultCache, scratch: &TempDir) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            self.source.clone(),
            RankingFilter::new(self.scorer.clone()),
            self.geocoder.clone(),
            ImageryFetcher::new(self.imagery.clone()),
            DetectionAdapter::new(self.detector.clone()),
            cache,
        )
        .scratch_root(scratch.path())
    }
}

/// Result cache on a local directory.
pub fn local_cache(dir: &TempDir) -> ResultCache {
    let store = LocalBlobStore::new(dir.path().join("cache"));
    store.ensure_root().unwrap();
    ResultCache::new(Arc::new(store), 32)
}

pub fn dir_is_empty(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}
