use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::annotate::encode_base64;
use super::{DetectionError, DetectionRequest, DetectionResult, Detector};
use crate::upstream::{UpstreamResult, http_client, json_body, send_checked};

const SERVICE: &str = "detector";

/// [`Detector`] posting the whole batch to an inference service.
///
/// Request: `{"queries": [...], "threshold": f32, "images": [base64 PNG, ...]}`.
/// Response: `{"results": [{"labels": [...], "scores": [...], "boxes": [[x0, y0, x1, y1], ...]}, ...]}`.
#[derive(Debug, Clone)]
pub struct HttpDetector {
    url: String,
    http: HttpClient,
}

impl HttpDetector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            url: url.into(),
            http: http_client(SERVICE, timeout)?,
        })
    }
}

#[derive(Serialize)]
struct DetectBody<'a> {
    queries: &'a [String],
    threshold: f32,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct DetectResponse {
    results: Vec<DetectionResult>,
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        images: &[Vec<u8>],
        request: &DetectionRequest,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        let body = DetectBody {
            queries: &request.queries,
            threshold: request.threshold,
            images: images.iter().map(|img| encode_base64(img)).collect(),
        };
        debug!(images = images.len(), "Posting detection batch");

        let response = send_checked(SERVICE, self.http.post(&self.url).json(&body)).await?;
        let parsed: DetectResponse = json_body(SERVICE, response).await?;
        Ok(parsed.results)
    }
}
