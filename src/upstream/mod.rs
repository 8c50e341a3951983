//! Shared plumbing for outbound provider calls.
//!
//! Every provider client is built with [`http_client`] so each call carries a
//! bounded timeout; an elapsed timeout surfaces as [`UpstreamError::Unreachable`],
//! the same failure as a refused connection.

pub mod error;

pub use error::{UpstreamError, UpstreamResult};

use std::time::Duration;

use reqwest::{Client as HttpClient, Response};

use crate::constants::USER_AGENT;

/// Builds the client for `service` with the per-call `timeout`.
pub fn http_client(service: &'static str, timeout: Duration) -> UpstreamResult<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|source| UpstreamError::Client { service, source })
}

/// Maps transport errors and non-success statuses into [`UpstreamError`].
pub(crate) async fn send_checked(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> UpstreamResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|source| UpstreamError::Unreachable { service, source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            service,
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Decodes a JSON body, reporting decode failures as [`UpstreamError::Malformed`].
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> UpstreamResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| UpstreamError::Malformed {
            service,
            reason: e.to_string(),
        })
}
