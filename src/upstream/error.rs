use thiserror::Error;

/// Failure talking to an external provider (discovery, scoring, geocoding, imagery, detection).
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The HTTP client for this provider could not be built.
    #[error("failed to build {service} client: {source}")]
    Client {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Connection failed or the call timed out.
    #[error("{service} unreachable: {source}")]
    Unreachable {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-success status.
    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    /// Provider answered but the body did not have the expected shape.
    #[error("{service} returned a malformed response: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
}

impl UpstreamError {
    /// Name of the provider that failed.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Client { service, .. }
            | Self::Unreachable { service, .. }
            | Self::Status { service, .. }
            | Self::Malformed { service, .. } => service,
        }
    }

    /// Returns `true` if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Unreachable { source, .. } if source.is_timeout())
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;
