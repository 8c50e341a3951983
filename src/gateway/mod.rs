//! HTTP gateway (Axum) in front of the pipeline.
//!
//! `GET /output?zip_code=&city=&state=` returns the address → record mapping;
//! `GET /healthz` is a liveness check.

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{OutputParams, output_handler};
pub use state::HandlerState;

use crate::constants::{SOLARSCAN_STATUS_HEADER, SOLARSCAN_STATUS_HEALTHY};

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/output", get(output_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        SOLARSCAN_STATUS_HEADER,
        HeaderValue::from_static(SOLARSCAN_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}
