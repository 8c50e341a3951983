use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detector call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("detector returned malformed output: {reason}")]
    Malformed { reason: String },

    #[error("failed to render detections: {reason}")]
    Render { reason: String },
}
