use thiserror::Error;

use crate::detection::DetectionError;
use crate::upstream::UpstreamError;

/// Request-level failures. Per-address failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Address discovery failed; nothing else can run.
    #[error("address discovery failed: {0}")]
    Upstream(#[from] UpstreamError),

    /// The detection batch failed or came back malformed.
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// The request's working area could not be created.
    #[error("working area unavailable: {0}")]
    Workspace(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
