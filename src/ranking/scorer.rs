use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::upstream::{UpstreamError, UpstreamResult, http_client, json_body, send_checked};

const SERVICE: &str = "solar scoring";

/// Field in the scoring payload used as the ranking metric.
pub const MAX_PANEL_COUNT_FIELD: &str = "Max Panel Count";

/// A successful scoring response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAddress {
    pub metric: f64,
    pub payload: serde_json::Value,
}

impl ScoredAddress {
    /// Extracts [`MAX_PANEL_COUNT_FIELD`] from a provider payload.
    pub fn from_payload(payload: serde_json::Value) -> Option<Self> {
        let metric = payload.get(MAX_PANEL_COUNT_FIELD)?.as_f64()?;
        Some(Self { metric, payload })
    }
}

#[async_trait]
/// Scores one address for solar suitability.
pub trait SolarScorer: Send + Sync {
    async fn score(&self, address: &str) -> UpstreamResult<ScoredAddress>;
}

/// [`SolarScorer`] calling `GET {url}?address=...`.
#[derive(Debug, Clone)]
pub struct HttpSolarScorer {
    url: String,
    http: HttpClient,
}

impl HttpSolarScorer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            url: url.into(),
            http: http_client(SERVICE, timeout)?,
        })
    }
}

#[async_trait]
impl SolarScorer for HttpSolarScorer {
    async fn score(&self, address: &str) -> UpstreamResult<ScoredAddress> {
        let request = self.http.get(&self.url).query(&[("address", address)]);
        let response = send_checked(SERVICE, request).await?;
        let payload: serde_json::Value = json_body(SERVICE, response).await?;

        ScoredAddress::from_payload(payload).ok_or_else(|| UpstreamError::Malformed {
            service: SERVICE,
            reason: format!("missing numeric '{MAX_PANEL_COUNT_FIELD}'"),
        })
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockSolarScorer;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{MAX_PANEL_COUNT_FIELD, SERVICE, ScoredAddress, SolarScorer};
    use crate::upstream::{UpstreamError, UpstreamResult};

    /// [`SolarScorer`] with fixed per-address metrics. Unknown addresses fail.
    #[derive(Debug, Default)]
    pub struct MockSolarScorer {
        metrics: HashMap<String, f64>,
        calls: AtomicUsize,
    }

    impl MockSolarScorer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_metric(mut self, address: impl Into<String>, metric: f64) -> Self {
            self.metrics.insert(address.into(), metric);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SolarScorer for MockSolarScorer {
        async fn score(&self, address: &str) -> UpstreamResult<ScoredAddress> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.metrics.get(address) {
                Some(&metric) => Ok(ScoredAddress {
                    metric,
                    payload: serde_json::json!({ MAX_PANEL_COUNT_FIELD: metric }),
                }),
                None => Err(UpstreamError::Status {
                    service: SERVICE,
                    status: 404,
                }),
            }
        }
    }
}
