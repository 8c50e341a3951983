//! Cross-cutting, shared constants.
//!
//! Provider parameters here mirror what the detection model and the imagery
//! provider were tuned against; change them together.

use std::time::Duration;

/// Number of candidates kept after ranking.
pub const DEFAULT_TOP_K: usize = 5;

/// Upper bound on addresses sent to the scoring service per request.
pub const DEFAULT_MAX_SCORED_ADDRESSES: usize = 100;

/// Concurrent in-flight scoring / imagery requests per pipeline run.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Text queries sent to the detector. Label ids index into this slice.
pub const DETECTION_QUERIES: [&str; 2] = ["solar panel", "pool"];

/// Label id for [`DETECTION_QUERIES`]`[0]`.
pub const SOLAR_LABEL: usize = 0;

/// Label id for [`DETECTION_QUERIES`]`[1]`.
pub const POOL_LABEL: usize = 1;

/// Minimum detector confidence for a box to be reported.
pub const DETECTION_THRESHOLD: f32 = 0.3;

/// Static-map zoom level for satellite snapshots.
pub const SNAPSHOT_ZOOM: u8 = 21;

/// Static-map snapshot edge length in pixels (square).
pub const SNAPSHOT_SIZE_PX: u32 = 600;

/// Server-side timeout embedded in the Overpass query.
pub const OVERPASS_QUERY_TIMEOUT_SECS: u64 = 25;

/// Default per-call timeout for discovery, scoring, geocoding and imagery.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the batched detection call.
pub const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Max cache entries held in memory in front of the blob store.
pub const DEFAULT_L1_CAPACITY: u64 = 256;

/// Response header carrying the pipeline outcome.
pub const SOLARSCAN_STATUS_HEADER: &str = "X-SolarScan-Status";
pub const SOLARSCAN_STATUS_HEALTHY: &str = "healthy";
pub const SOLARSCAN_STATUS_INVALID: &str = "INVALID";
pub const SOLARSCAN_STATUS_ERROR: &str = "ERROR";

/// Response header echoing the per-request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// File extension for persisted imagery in the working area.
pub const SNAPSHOT_EXTENSION: &str = "png";

pub const USER_AGENT: &str = concat!("solarscan/", env!("CARGO_PKG_VERSION"));
