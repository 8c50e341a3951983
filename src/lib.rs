//! SolarScan library crate (used by the server binary and integration tests).
//!
//! Given a `(zip_code, city, state)` location, the pipeline discovers residential
//! addresses, keeps the most solar-suitable few, fetches a satellite snapshot of
//! each and runs one batched detection pass for solar panels and pools. The
//! annotated result is cached per location so repeat queries make no external
//! calls.
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`PipelineOrchestrator`], [`PipelineOutcome`], [`PipelineReport`], [`PipelineError`]
//! - [`LocationQuery`], [`ResponseRecord`], [`CacheEntry`] - request and result types
//!
//! ## Stages
//! - [`AddressSource`] / [`OverpassSource`] - address discovery
//! - [`RankingFilter`] / [`SolarScorer`] - top-K selection
//! - [`Geocoder`] / [`GoogleGeocoder`] - coordinates
//! - [`ImageryFetcher`] / [`StaticMapsProvider`] - snapshots in a [`WorkingArea`]
//! - [`DetectionAdapter`] / [`Detector`] - batched detection and rendering
//! - [`ResultCache`] / [`BlobStore`] - persistent result cache
//!
//! ## Utilities
//! - [`hash_address`] / [`LocationKey`] - address-free file naming
//! - [`Config`] - environment configuration
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod detection;
pub mod discovery;
pub mod gateway;
pub mod geocode;
pub mod hashing;
pub mod imagery;
pub mod pipeline;
pub mod ranking;
pub mod types;
pub mod upstream;

pub use cache::{
    BlobStore, CacheError, CacheKey, CacheResult, GcsBlobStore, L1Cache, LocalBlobStore,
    ResultCache, build_blob_store,
};
#[cfg(any(test, feature = "mock"))]
pub use cache::MemoryBlobStore;

pub use config::{CacheBackendKind, Config, ConfigError};
pub use constants::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_SCORED_ADDRESSES, DEFAULT_TOP_K, DETECTION_QUERIES,
    DETECTION_THRESHOLD, POOL_LABEL, SOLAR_LABEL, SOLARSCAN_STATUS_HEADER,
};

pub use detection::{
    DetectionAdapter, DetectionError, DetectionRequest, DetectionResult, Detector, HttpDetector,
    encode_base64, render_detections,
};
#[cfg(any(test, feature = "mock"))]
pub use detection::MockDetector;

pub use discovery::{AddressSource, OverpassSource};
#[cfg(any(test, feature = "mock"))]
pub use discovery::MockAddressSource;

pub use geocode::{GeocodeError, Geocoder, GoogleGeocoder};
#[cfg(any(test, feature = "mock"))]
pub use geocode::MockGeocoder;

pub use hashing::{LocationKey, hash_address};

pub use imagery::{ImageryError, ImageryFetcher, ImageryProvider, StaticMapsProvider, WorkingArea};
#[cfg(any(test, feature = "mock"))]
pub use imagery::MockImageryProvider;

pub use pipeline::{
    PipelineError, PipelineOrchestrator, PipelineOutcome, PipelineReport, PipelineResult,
    PipelineStage,
};

pub use ranking::{HttpSolarScorer, RankOutcome, RankingFilter, ScoredAddress, SolarScorer};
#[cfg(any(test, feature = "mock"))]
pub use ranking::MockSolarScorer;

pub use types::{Address, CacheEntry, Candidate, Coordinates, CoordinateRecord, LocationQuery, ResponseRecord};
pub use upstream::{UpstreamError, UpstreamResult};
