//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `SOLARSCAN_*` environment variables.
//! Provider credentials and service URLs are threaded into component
//! constructors from here; nothing else in the crate reads the environment.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DETECTOR_TIMEOUT, DEFAULT_L1_CAPACITY, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_SCORED_ADDRESSES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOP_K,
};

/// Default Overpass interpreter used for address discovery.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
/// Default Google Geocoding endpoint.
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
/// Default Google Static Maps endpoint.
pub const DEFAULT_STATICMAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
/// Default GCS bucket holding cached results.
pub const DEFAULT_GCS_BUCKET: &str = "solar-scan-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Where cached results are persisted.
pub enum CacheBackendKind {
    #[default]
    /// Google Cloud Storage bucket.
    Gcs,
    /// Local directory.
    Local,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gcs" | "google" => Ok(Self::Gcs),
            "local" | "fs" => Ok(Self::Local),
            _ => Err(ConfigError::UnknownCacheBackend {
                value: s.to_string(),
            }),
        }
    }
}

/// Service configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SOLARSCAN_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `5000`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// API key for the geocoding and static-imagery provider.
    pub maps_api_key: Option<String>,

    /// Overpass interpreter URL.
    pub overpass_url: String,

    /// Solar scoring service URL (`GET ?address=`).
    pub scoring_url: Option<String>,

    /// Geocoding endpoint.
    pub geocode_url: String,

    /// Static satellite imagery endpoint.
    pub staticmap_url: String,

    /// Detection service URL.
    pub detector_url: Option<String>,

    /// Cache storage backend. Default: GCS.
    pub cache_backend: CacheBackendKind,

    /// Bucket used by the GCS backend.
    pub gcs_bucket: String,

    /// Static OAuth token for GCS; fetched from the metadata server when unset.
    pub gcs_token: Option<String>,

    /// Root directory used by the local backend. Default: `./.cache`.
    pub cache_path: PathBuf,

    /// Parent directory for request-scoped imagery working areas.
    pub scratch_root: PathBuf,

    /// Candidates kept after ranking. Default: `5`.
    pub top_k: usize,

    /// Max addresses scored per request. Default: `100`.
    pub max_scored_addresses: usize,

    /// Concurrent per-address requests. Default: `4`.
    pub max_concurrency: usize,

    /// Timeout for each discovery/scoring/geocoding/imagery call.
    pub request_timeout: Duration,

    /// Timeout for the batched detection call.
    pub detector_timeout: Duration,

    /// Max cache entries held in memory. Default: `256`.
    pub l1_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            maps_api_key: None,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            scoring_url: None,
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            staticmap_url: DEFAULT_STATICMAP_URL.to_string(),
            detector_url: None,
            cache_backend: CacheBackendKind::default(),
            gcs_bucket: DEFAULT_GCS_BUCKET.to_string(),
            gcs_token: None,
            cache_path: PathBuf::from("./.cache"),
            scratch_root: env::temp_dir(),
            top_k: DEFAULT_TOP_K,
            max_scored_addresses: DEFAULT_MAX_SCORED_ADDRESSES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            detector_timeout: DEFAULT_DETECTOR_TIMEOUT,
            l1_capacity: DEFAULT_L1_CAPACITY,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "SOLARSCAN_PORT";
    const ENV_BIND_ADDR: &'static str = "SOLARSCAN_BIND_ADDR";
    const ENV_MAPS_API_KEY: &'static str = "SOLARSCAN_MAPS_API_KEY";
    const ENV_LEGACY_API_KEY: &'static str = "API_KEY";
    const ENV_OVERPASS_URL: &'static str = "SOLARSCAN_OVERPASS_URL";
    const ENV_SCORING_URL: &'static str = "SOLARSCAN_SCORING_URL";
    const ENV_GEOCODE_URL: &'static str = "SOLARSCAN_GEOCODE_URL";
    const ENV_STATICMAP_URL: &'static str = "SOLARSCAN_STATICMAP_URL";
    const ENV_DETECTOR_URL: &'static str = "SOLARSCAN_DETECTOR_URL";
    const ENV_CACHE_BACKEND: &'static str = "SOLARSCAN_CACHE_BACKEND";
    const ENV_GCS_BUCKET: &'static str = "SOLARSCAN_GCS_BUCKET";
    const ENV_GCS_TOKEN: &'static str = "SOLARSCAN_GCS_TOKEN";
    const ENV_CACHE_PATH: &'static str = "SOLARSCAN_CACHE_PATH";
    const ENV_SCRATCH_ROOT: &'static str = "SOLARSCAN_SCRATCH_ROOT";
    const ENV_TOP_K: &'static str = "SOLARSCAN_TOP_K";
    const ENV_MAX_SCORED: &'static str = "SOLARSCAN_MAX_SCORED";
    const ENV_MAX_CONCURRENCY: &'static str = "SOLARSCAN_MAX_CONCURRENCY";
    const ENV_REQUEST_TIMEOUT_SECS: &'static str = "SOLARSCAN_REQUEST_TIMEOUT_SECS";
    const ENV_DETECTOR_TIMEOUT_SECS: &'static str = "SOLARSCAN_DETECTOR_TIMEOUT_SECS";
    const ENV_L1_CAPACITY: &'static str = "SOLARSCAN_L1_CAPACITY";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let maps_api_key = Self::parse_optional_string_from_env(Self::ENV_MAPS_API_KEY)
            .or_else(|| Self::parse_optional_string_from_env(Self::ENV_LEGACY_API_KEY));
        let overpass_url = Self::parse_string_from_env(Self::ENV_OVERPASS_URL, defaults.overpass_url);
        let scoring_url = Self::parse_optional_string_from_env(Self::ENV_SCORING_URL);
        let geocode_url = Self::parse_string_from_env(Self::ENV_GEOCODE_URL, defaults.geocode_url);
        let staticmap_url =
            Self::parse_string_from_env(Self::ENV_STATICMAP_URL, defaults.staticmap_url);
        let detector_url = Self::parse_optional_string_from_env(Self::ENV_DETECTOR_URL);
        let cache_backend = match Self::parse_optional_string_from_env(Self::ENV_CACHE_BACKEND) {
            Some(value) => value.parse()?,
            None => defaults.cache_backend,
        };
        let gcs_bucket = Self::parse_string_from_env(Self::ENV_GCS_BUCKET, defaults.gcs_bucket);
        let gcs_token = Self::parse_optional_string_from_env(Self::ENV_GCS_TOKEN);
        let cache_path = Self::parse_path_from_env(Self::ENV_CACHE_PATH, defaults.cache_path);
        let scratch_root = Self::parse_path_from_env(Self::ENV_SCRATCH_ROOT, defaults.scratch_root);
        let top_k = Self::parse_number_from_env(Self::ENV_TOP_K, defaults.top_k)?;
        let max_scored_addresses =
            Self::parse_number_from_env(Self::ENV_MAX_SCORED, defaults.max_scored_addresses)?;
        let max_concurrency =
            Self::parse_number_from_env(Self::ENV_MAX_CONCURRENCY, defaults.max_concurrency)?;
        let request_timeout = Duration::from_secs(Self::parse_number_from_env(
            Self::ENV_REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        )?);
        let detector_timeout = Duration::from_secs(Self::parse_number_from_env(
            Self::ENV_DETECTOR_TIMEOUT_SECS,
            defaults.detector_timeout.as_secs(),
        )?);
        let l1_capacity = Self::parse_number_from_env(Self::ENV_L1_CAPACITY, defaults.l1_capacity)?;

        Ok(Self {
            port,
            bind_addr,
            maps_api_key,
            overpass_url,
            scoring_url,
            geocode_url,
            staticmap_url,
            detector_url,
            cache_backend,
            gcs_bucket,
            gcs_token,
            cache_path,
            scratch_root,
            top_k,
            max_scored_addresses,
            max_concurrency,
            request_timeout,
            detector_timeout,
            l1_capacity,
        })
    }

    /// Validates required settings and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maps_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_MAPS_API_KEY,
            });
        }

        let scoring_url = self.scoring_url.as_deref().ok_or(ConfigError::MissingEnvVar {
            name: Self::ENV_SCORING_URL,
        })?;
        let detector_url = self
            .detector_url
            .as_deref()
            .ok_or(ConfigError::MissingEnvVar {
                name: Self::ENV_DETECTOR_URL,
            })?;

        for (name, value) in [
            (Self::ENV_OVERPASS_URL, self.overpass_url.as_str()),
            (Self::ENV_SCORING_URL, scoring_url),
            (Self::ENV_GEOCODE_URL, self.geocode_url.as_str()),
            (Self::ENV_STATICMAP_URL, self.staticmap_url.as_str()),
            (Self::ENV_DETECTOR_URL, detector_url),
        ] {
            if !is_http_url(value) {
                return Err(ConfigError::InvalidUrl {
                    name,
                    value: value.to_string(),
                });
            }
        }

        for (name, timeout) in [
            (Self::ENV_REQUEST_TIMEOUT_SECS, self.request_timeout),
            (Self::ENV_DETECTOR_TIMEOUT_SECS, self.detector_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidNumber {
                    name,
                    value: "0".to_string(),
                    reason: "timeout must be at least 1 second".to_string(),
                });
            }
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidNumber {
                name: Self::ENV_MAX_CONCURRENCY,
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.cache_backend == CacheBackendKind::Gcs && self.gcs_bucket.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_GCS_BUCKET,
            });
        }

        for path in [&self.cache_path, &self.scratch_root] {
            if path.exists() && !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::parse_optional_string_from_env(var_name).unwrap_or(default)
    }

    fn parse_number_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidNumber {
                name: var_name,
                reason: e.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }
}

/// Absolute `http`/`https` URL with a host, as reqwest will parse it.
fn is_http_url(value: &str) -> bool {
    match reqwest::Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
