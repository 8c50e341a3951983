use super::*;
use crate::cache::{MemoryBlobStore, to_stored_json};
use crate::constants::{POOL_LABEL, SOLAR_LABEL};
use crate::detection::{DetectionResult, MockDetector};
use crate::discovery::MockAddressSource;
use crate::geocode::MockGeocoder;
use crate::imagery::MockImageryProvider;
use crate::ranking::MockSolarScorer;
use crate::types::Coordinates;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

const OAK: &str = "12 Oak Court San Jose CA";
const ELM: &str = "7 Elm Street San Jose CA";
const PINE: &str = "301 Pine Way San Jose CA";

struct Harness {
    source: Arc<MockAddressSource>,
    scorer: Arc<MockSolarScorer>,
    geocoder: Arc<MockGeocoder>,
    imagery: Arc<MockImageryProvider>,
    detector: Arc<MockDetector>,
    store: Arc<MemoryBlobStore>,
    scratch: TempDir,
}

impl Harness {
    fn new(
        source: MockAddressSource,
        scorer: MockSolarScorer,
        geocoder: MockGeocoder,
        imagery: MockImageryProvider,
        detector: MockDetector,
        store: MemoryBlobStore,
    ) -> Self {
        Self {
            source: Arc::new(source),
            scorer: Arc::new(scorer),
            geocoder: Arc::new(geocoder),
            imagery: Arc::new(imagery),
            detector: Arc::new(detector),
            store: Arc::new(store),
            scratch: TempDir::new().unwrap(),
        }
    }

    fn standard(detector: MockDetector) -> Self {
        Self::new(
            MockAddressSource::with_addresses([OAK, ELM, PINE]),
            scorer(),
            geocoder(),
            MockImageryProvider::new(),
            detector,
            MemoryBlobStore::new(),
        )
    }

    fn orchestrator(&self) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            self.source.clone(),
            RankingFilter::new(self.scorer.clone()),
            self.geocoder.clone(),
            ImageryFetcher::new(self.imagery.clone()),
            DetectionAdapter::new(self.detector.clone()),
            ResultCache::new(self.store.clone(), 16),
        )
        .scratch_root(self.scratch.path())
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }

    fn external_calls(&self) -> usize {
        self.source.calls()
            + self.scorer.calls()
            + self.geocoder.calls()
            + self.imagery.calls()
            + self.detector.calls()
    }
}

fn scorer() -> MockSolarScorer {
    MockSolarScorer::new()
        .with_metric(OAK, 40.0)
        .with_metric(ELM, 55.0)
        .with_metric(PINE, 12.0)
}

fn geocoder() -> MockGeocoder {
    MockGeocoder::new()
        .with_coords(OAK, 37.251, -121.851)
        .with_coords(ELM, 37.252, -121.852)
        .with_coords(PINE, 37.253, -121.853)
}

fn detection(labels: &[usize]) -> DetectionResult {
    DetectionResult {
        labels: labels.to_vec(),
        scores: vec![0.7; labels.len()],
        boxes: vec![[2.0, 2.0, 20.0, 20.0]; labels.len()],
    }
}

fn query() -> LocationQuery {
    LocationQuery::new("95123", "San Jose", "CA")
}

#[tokio::test]
async fn test_fresh_run_builds_and_caches_entry() {
    // inputs arrive ranked: ELM (55), OAK (40), PINE (12)
    let harness = Harness::standard(MockDetector::per_image(vec![
        detection(&[SOLAR_LABEL]),
        detection(&[POOL_LABEL]),
        detection(&[]),
    ]));

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let PipelineOutcome::Completed { entry, report } = outcome else {
        panic!("expected a fresh result");
    };
    assert_eq!(entry.len(), 3);
    assert!(entry[ELM].has_solar && !entry[ELM].has_pool);
    assert!(!entry[OAK].has_solar && entry[OAK].has_pool);
    assert!(!entry[PINE].has_solar && !entry[PINE].has_pool);
    for record in entry.values() {
        let png = STANDARD.decode(&record.base64_image).unwrap();
        assert!(image::load_from_memory(&png).is_ok());
    }

    assert_eq!(report.discovered, 3);
    assert_eq!(report.selected, 3);
    assert_eq!(report.detected, 3);
    assert!(report.cache_written);
    assert_eq!(report.stage_reached, Some(PipelineStage::Persist));

    assert_eq!(harness.detector.batch_sizes(), vec![3]);
    assert_eq!(
        harness.store.object("CA/95123/San Jose.json").unwrap(),
        to_stored_json(&entry).unwrap()
    );
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_second_run_is_cache_hit_without_external_calls() {
    let harness = Harness::standard(MockDetector::uniform(detection(&[SOLAR_LABEL, POOL_LABEL])));
    let orchestrator = harness.orchestrator();

    let first = orchestrator.run(&query()).await.unwrap();
    let calls_after_first = harness.external_calls();
    let second = orchestrator.run(&query()).await.unwrap();

    assert!(second.is_cache_hit());
    assert_eq!(second.status_label(), "HIT");
    assert_eq!(first.entry(), second.entry());
    assert_eq!(harness.external_calls(), calls_after_first);
    assert_eq!(harness.store.put_calls(), 1);
}

#[tokio::test]
async fn test_cache_hit_from_existing_object() {
    let harness = Harness::standard(MockDetector::failing());
    let mut stored = CacheEntry::new();
    stored.insert(
        OAK.to_string(),
        ResponseRecord {
            has_solar: true,
            has_pool: false,
            base64_image: "aW1n".to_string(),
        },
    );
    harness
        .store
        .insert_raw("CA/95123/San Jose.json", to_stored_json(&stored).unwrap());

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    assert_eq!(outcome, PipelineOutcome::CacheHit(stored));
    assert_eq!(harness.external_calls(), 0);
}

#[tokio::test]
async fn test_empty_discovery_is_empty_outcome() {
    let harness = Harness::new(
        MockAddressSource::with_addresses(Vec::<String>::new()),
        scorer(),
        geocoder(),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    assert_eq!(outcome.status_label(), "EMPTY");
    assert!(outcome.entry().is_empty());
    assert_eq!(harness.store.put_calls(), 0);
    assert_eq!(harness.scorer.calls(), 0);
}

#[tokio::test]
async fn test_discovery_failure_is_fatal() {
    let harness = Harness::new(
        MockAddressSource::unavailable(),
        scorer(),
        geocoder(),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[])),
        MemoryBlobStore::new(),
    );

    let err = harness.orchestrator().run(&query()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Upstream(_)));
    assert_eq!(harness.scorer.calls(), 0);
    assert_eq!(harness.store.put_calls(), 0);
}

#[tokio::test]
async fn test_all_scoring_failures_is_empty() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK, ELM]),
        MockSolarScorer::new(),
        geocoder(),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let PipelineOutcome::Empty { report } = outcome else {
        panic!("expected empty outcome");
    };
    assert_eq!(report.scoring_failures, 2);
    assert_eq!(report.stage_reached, Some(PipelineStage::Ingest));
    assert_eq!(harness.geocoder.calls(), 0);
    assert_eq!(harness.store.put_calls(), 0);
}

#[tokio::test]
async fn test_geocode_no_match_drops_one_address() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK, ELM, PINE]),
        scorer(),
        MockGeocoder::new()
            .with_coords(OAK, 37.251, -121.851)
            .with_coords(ELM, 37.252, -121.852),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[SOLAR_LABEL])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let PipelineOutcome::Completed { entry, report } = outcome else {
        panic!("expected a fresh result");
    };
    assert_eq!(entry.len(), 2);
    assert!(!entry.contains_key(PINE));
    assert_eq!(report.geocode_no_match, 1);
    assert_eq!(report.dropped_after_selection(), 1);
    assert_eq!(harness.imagery.calls(), 2);
    assert_eq!(harness.detector.batch_sizes(), vec![2]);
}

#[tokio::test]
async fn test_geocode_outage_counted_separately() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK, ELM]),
        scorer(),
        geocoder().unavailable_for(OAK),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.geocode_failures, 1);
    assert_eq!(report.geocode_no_match, 0);
    assert_eq!(outcome.entry().keys().collect::<Vec<_>>(), vec![ELM]);
}

#[tokio::test]
async fn test_imagery_failure_drops_address() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK, ELM]),
        scorer(),
        geocoder(),
        MockImageryProvider::new().failing_at(Coordinates::new(37.252, -121.852)),
        MockDetector::uniform(detection(&[POOL_LABEL])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    assert_eq!(outcome.report().unwrap().imagery_failures, 1);
    assert_eq!(outcome.entry().keys().collect::<Vec<_>>(), vec![OAK]);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_every_address_dropped_is_empty_without_detection() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK, ELM]),
        scorer(),
        MockGeocoder::new(),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let PipelineOutcome::Empty { report } = outcome else {
        panic!("expected empty outcome");
    };
    assert_eq!(report.geocode_no_match, 2);
    assert_eq!(harness.detector.calls(), 0);
    assert_eq!(harness.store.put_calls(), 0);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_detection_failure_clears_working_area_and_skips_cache() {
    let harness = Harness::standard(MockDetector::failing());

    let err = harness.orchestrator().run(&query()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Detection(_)));
    assert_eq!(harness.imagery.calls(), 3);
    assert!(harness.scratch_is_empty());
    assert_eq!(harness.store.put_calls(), 0);
}

#[tokio::test]
async fn test_malformed_detection_output_is_fatal() {
    let harness = Harness::standard(MockDetector::dropping_last());

    let err = harness.orchestrator().run(&query()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Detection(crate::detection::DetectionError::Malformed { .. })
    ));
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_cache_write_failure_still_returns_result() {
    let harness = Harness::new(
        MockAddressSource::with_addresses([OAK]),
        scorer(),
        geocoder(),
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[SOLAR_LABEL])),
        MemoryBlobStore::new().failing_puts(),
    );

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    let PipelineOutcome::Completed { entry, report } = outcome else {
        panic!("expected a fresh result");
    };
    assert_eq!(entry.len(), 1);
    assert!(!report.cache_written);
    assert_eq!(harness.store.put_calls(), 1);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_recomputed() {
    let harness = Harness::standard(MockDetector::uniform(detection(&[])));
    harness.store.insert_raw("CA/95123/San Jose.json", "{truncated");

    let outcome = harness.orchestrator().run(&query()).await.unwrap();

    assert_eq!(outcome.status_label(), "MISS");
    assert_eq!(harness.source.calls(), 1);
    let stored = harness.store.object("CA/95123/San Jose.json").unwrap();
    assert_eq!(stored, to_stored_json(&outcome.entry()).unwrap());
}

#[tokio::test]
async fn test_only_top_k_addresses_are_processed() {
    let addresses: Vec<String> = (1..=8).map(|n| format!("{n} Birch Lane San Jose CA")).collect();
    let mut scorer = MockSolarScorer::new();
    let mut geocoder = MockGeocoder::new();
    for (i, address) in addresses.iter().enumerate() {
        scorer = scorer.with_metric(address, i as f64);
        geocoder = geocoder.with_coords(address, 37.0 + i as f64 / 1000.0, -121.0);
    }
    let harness = Harness::new(
        MockAddressSource::with_addresses(addresses.clone()),
        scorer,
        geocoder,
        MockImageryProvider::new(),
        MockDetector::uniform(detection(&[SOLAR_LABEL])),
        MemoryBlobStore::new(),
    );

    let outcome = harness.orchestrator().concurrency(1).run(&query()).await.unwrap();

    let entry = outcome.into_entry();
    let mut expected: Vec<&str> = addresses[3..].iter().map(String::as_str).collect();
    expected.sort();
    assert_eq!(entry.keys().map(String::as_str).collect::<Vec<_>>(), expected);
    assert_eq!(harness.geocoder.calls(), 5);
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_run_future_is_send() {
    let harness = Harness::standard(MockDetector::uniform(detection(&[SOLAR_LABEL])));
    let orchestrator = harness.orchestrator();
    let query = query();

    let future = orchestrator.run(&query);

    assert_send(&future);
}

#[tokio::test]
async fn test_run_on_spawned_task() {
    let harness = Harness::standard(MockDetector::uniform(detection(&[SOLAR_LABEL])));
    let orchestrator = harness.orchestrator();

    let outcome = tokio::spawn(async move { orchestrator.run(&query()).await })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status_label(), "MISS");
    assert_eq!(outcome.entry().len(), 3);
}

/// Serves a valid snapshot everywhere except `broken`, which gets undecodable bytes.
struct UndecodableAt {
    broken: Coordinates,
}

#[async_trait::async_trait]
impl crate::imagery::ImageryProvider for UndecodableAt {
    async fn snapshot(&self, coords: Coordinates) -> crate::upstream::UpstreamResult<Vec<u8>> {
        if coords == self.broken {
            Ok(b"not a png".to_vec())
        } else {
            Ok(MockImageryProvider::png_for(coords))
        }
    }
}

#[tokio::test]
async fn test_render_failure_drops_only_that_address() {
    let harness = Harness::standard(MockDetector::uniform(detection(&[SOLAR_LABEL])));
    let orchestrator = PipelineOrchestrator::new(
        harness.source.clone(),
        RankingFilter::new(harness.scorer.clone()),
        harness.geocoder.clone(),
        ImageryFetcher::new(Arc::new(UndecodableAt {
            broken: Coordinates::new(37.251, -121.851),
        })),
        DetectionAdapter::new(harness.detector.clone()),
        ResultCache::new(harness.store.clone(), 16),
    )
    .scratch_root(harness.scratch.path());

    let outcome = orchestrator.run(&query()).await.unwrap();

    let PipelineOutcome::Completed { entry, report } = outcome else {
        panic!("expected a fresh result");
    };
    assert_eq!(entry.len(), 2);
    assert!(!entry.contains_key(OAK));
    assert_eq!(report.render_failures, 1);
    assert_eq!(report.detected, 2);
    assert_eq!(harness.detector.batch_sizes(), vec![3]);
    assert!(harness.scratch_is_empty());
}
