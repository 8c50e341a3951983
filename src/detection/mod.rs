//! Batched open-vocabulary detection over fetched snapshots.
//!
//! The model runs behind an external service; this module owns the contract
//! (one call per request, results one-to-one and in input order), validation of
//! what comes back, and rendering of boxes onto the images returned to callers.

pub mod annotate;
pub mod error;
mod http;

#[cfg(any(test, feature = "mock"))]
mod mock;

pub use annotate::{encode_base64, render_detections};
pub use error::DetectionError;
pub use http::HttpDetector;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockDetector;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::constants::{DETECTION_QUERIES, DETECTION_THRESHOLD, POOL_LABEL, SOLAR_LABEL};

/// `[xmin, ymin, xmax, ymax]` in pixels.
pub type BoundingBox = [f32; 4];

/// Text queries and confidence threshold for one detection batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRequest {
    pub queries: Vec<String>,
    pub threshold: f32,
}

impl Default for DetectionRequest {
    fn default() -> Self {
        Self {
            queries: DETECTION_QUERIES.iter().map(|q| q.to_string()).collect(),
            threshold: DETECTION_THRESHOLD,
        }
    }
}

/// Detections for one image; the three sequences are parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub labels: Vec<usize>,
    pub scores: Vec<f32>,
    pub boxes: Vec<BoundingBox>,
}

impl DetectionResult {
    pub fn has_label(&self, label: usize) -> bool {
        self.labels.contains(&label)
    }

    pub fn has_solar(&self) -> bool {
        self.has_label(SOLAR_LABEL)
    }

    pub fn has_pool(&self) -> bool {
        self.has_label(POOL_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates `(label, score, box)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32, &BoundingBox)> {
        self.labels
            .iter()
            .zip(&self.scores)
            .zip(&self.boxes)
            .map(|((label, score), bbox)| (*label, *score, bbox))
    }

    fn check(&self, index: usize, query_count: usize) -> Result<(), DetectionError> {
        if self.labels.len() != self.scores.len() || self.labels.len() != self.boxes.len() {
            return Err(DetectionError::Malformed {
                reason: format!(
                    "result {index}: {} labels, {} scores, {} boxes",
                    self.labels.len(),
                    self.scores.len(),
                    self.boxes.len()
                ),
            });
        }
        if let Some(label) = self.labels.iter().find(|l| **l >= query_count) {
            return Err(DetectionError::Malformed {
                reason: format!("result {index}: label {label} has no query"),
            });
        }
        Ok(())
    }
}

/// Runs one inference call over a whole batch of encoded images.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        images: &[Vec<u8>],
        request: &DetectionRequest,
    ) -> Result<Vec<DetectionResult>, DetectionError>;
}

/// Wraps a [`Detector`] and enforces the ordered one-to-one batch contract.
#[derive(Clone)]
pub struct DetectionAdapter {
    detector: Arc<dyn Detector>,
    request: DetectionRequest,
}

impl std::fmt::Debug for DetectionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionAdapter")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl DetectionAdapter {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            request: DetectionRequest::default(),
        }
    }

    pub fn with_request(mut self, request: DetectionRequest) -> Self {
        self.request = request;
        self
    }

    pub fn request(&self) -> &DetectionRequest {
        &self.request
    }

    /// Detects over `images`; result `i` belongs to image `i`.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub async fn detect(&self, images: &[Vec<u8>]) -> Result<Vec<DetectionResult>, DetectionError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let results = self.detector.detect(images, &self.request).await?;

        if results.len() != images.len() {
            return Err(DetectionError::Malformed {
                reason: format!(
                    "expected {} results, detector returned {}",
                    images.len(),
                    results.len()
                ),
            });
        }
        for (index, result) in results.iter().enumerate() {
            result.check(index, self.request.queries.len())?;
        }

        info!(
            detections = results.iter().map(DetectionResult::len).sum::<usize>(),
            "Detection batch complete"
        );
        Ok(results)
    }

    /// Renders `result` onto `image` and returns the annotated PNG.
    pub fn render(&self, image: &[u8], result: &DetectionResult) -> Result<Vec<u8>, DetectionError> {
        render_detections(image, result)
    }
}
