use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::constants::{SOLARSCAN_STATUS_ERROR, SOLARSCAN_STATUS_HEADER, SOLARSCAN_STATUS_INVALID};
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for GatewayError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Upstream(_) => GatewayError::Upstream(err.to_string()),
            PipelineError::Detection(_) => GatewayError::Detection(err.to_string()),
            PipelineError::Workspace(_) => GatewayError::Internal(err.to_string()),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) | GatewayError::Detection(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let solarscan_status = match &self {
            GatewayError::InvalidRequest(_) => SOLARSCAN_STATUS_INVALID,
            _ => SOLARSCAN_STATUS_ERROR,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            SOLARSCAN_STATUS_HEADER,
            HeaderValue::from_static(solarscan_status),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
