use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DetectionError, DetectionRequest, DetectionResult, Detector};
use crate::upstream::UpstreamError;

#[derive(Debug, Clone)]
enum Behavior {
    Uniform(DetectionResult),
    PerImage(Vec<DetectionResult>),
    Fail,
    DropLast,
}

/// [`Detector`] with scripted answers and batch bookkeeping.
#[derive(Debug)]
pub struct MockDetector {
    behavior: Behavior,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockDetector {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Returns `result` for every image.
    pub fn uniform(result: DetectionResult) -> Self {
        Self::with_behavior(Behavior::Uniform(result))
    }

    /// Returns `results[i % len]` for image `i`.
    pub fn per_image(results: Vec<DetectionResult>) -> Self {
        Self::with_behavior(Behavior::PerImage(results))
    }

    /// Fails every call as unavailable.
    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    /// Returns one result fewer than the number of images.
    pub fn dropping_last() -> Self {
        Self::with_behavior(Behavior::DropLast)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn detect(
        &self,
        images: &[Vec<u8>],
        _request: &DetectionRequest,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(images.len());

        match &self.behavior {
            Behavior::Uniform(result) => Ok(vec![result.clone(); images.len()]),
            Behavior::PerImage(results) if !results.is_empty() => Ok((0..images.len())
                .map(|i| results[i % results.len()].clone())
                .collect()),
            Behavior::PerImage(_) => Ok(vec![DetectionResult::default(); images.len()]),
            Behavior::Fail => Err(DetectionError::Upstream(UpstreamError::Status {
                service: "detector",
                status: 503,
            })),
            Behavior::DropLast => Ok(vec![
                DetectionResult::default();
                images.len().saturating_sub(1)
            ]),
        }
    }
}
