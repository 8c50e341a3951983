use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::constants::{REQUEST_ID_HEADER, SOLARSCAN_STATUS_HEADER};
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::pipeline::PipelineOutcome;
use crate::types::LocationQuery;

/// Raw `/output` query string. Fields are optional so missing values get a JSON 400.
#[derive(Debug, Default, Deserialize)]
pub struct OutputParams {
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl OutputParams {
    pub fn into_query(self) -> Result<LocationQuery, GatewayError> {
        let zip_code = required("zip_code", self.zip_code)?;
        let city = required("city", self.city)?;
        let state = required("state", self.state)?;
        Ok(LocationQuery::new(zip_code, city, state))
    }
}

fn required(name: &str, value: Option<String>) -> Result<String, GatewayError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest(format!("missing query parameter `{name}`")))
}

#[instrument(skip(state, params), fields(request_id = tracing::field::Empty))]
pub async fn output_handler(
    State(state): State<HandlerState>,
    Query(params): Query<OutputParams>,
) -> Result<Response, GatewayError> {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    tracing::Span::current().record("request_id", tracing::field::display(&request_id));

    let query = params.into_query()?;
    let outcome = state.pipeline.run(&query).await.map_err(|e| {
        warn!(error = %e, "Pipeline failed");
        GatewayError::from(e)
    })?;

    info!(
        location = %query,
        status = outcome.status_label(),
        "Request served"
    );
    make_response(&outcome, &request_id)
}

pub(crate) fn make_response(
    outcome: &PipelineOutcome,
    request_id: &str,
) -> Result<Response, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        SOLARSCAN_STATUS_HEADER,
        HeaderValue::from_static(outcome.status_label()),
    );
    let id = HeaderValue::from_str(request_id)
        .map_err(|e| GatewayError::Internal(format!("invalid request id: {e}")))?;
    headers.insert(REQUEST_ID_HEADER, id);

    let body = match outcome {
        PipelineOutcome::CacheHit(entry) | PipelineOutcome::Completed { entry, .. } => {
            Json(entry).into_response()
        }
        PipelineOutcome::Empty { .. } => Json(serde_json::json!({})).into_response(),
    };

    Ok((StatusCode::OK, headers, body).into_response())
}
