//! Address → coordinate resolution through the Google Geocoding API.
//!
//! A provider status other than `OK` is [`GeocodeError::NoMatch`]; transport
//! and decoding failures are [`GeocodeError::Upstream`]. Callers treat both as
//! "no coordinate" for that one address.


use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use thiserror::Error;

use crate::types::Coordinates;
use crate::upstream::{UpstreamError, UpstreamResult, http_client, json_body, send_checked};

const SERVICE: &str = "geocoding";

#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The provider answered but had no usable result.
    #[error("no geocoding match (status {status})")]
    NoMatch { status: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GeocodeError {
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}

#[async_trait]
/// Resolves an address to a coordinate.
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// [`Geocoder`] backed by the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    url: String,
    api_key: String,
    http: HttpClient,
}

impl GoogleGeocoder {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> UpstreamResult<Self> {
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            http: http_client(SERVICE, timeout)?,
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let request = self
            .http
            .get(&self.url)
            .query(&[("address", address), ("key", self.api_key.as_str())]);
        let response = send_checked(SERVICE, request).await?;
        let body: GeocodeResponse = json_body(SERVICE, response).await?;

        coordinates_from_response(body)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

pub(crate) fn coordinates_from_response(
    body: GeocodeResponse,
) -> Result<Coordinates, GeocodeError> {
    if body.status != "OK" {
        return Err(GeocodeError::NoMatch {
            status: body.status,
        });
    }

    body.results
        .into_iter()
        .next()
        .map(|r| Coordinates::new(r.geometry.location.lat, r.geometry.location.lng))
        .ok_or(GeocodeError::NoMatch {
            status: "OK_WITHOUT_RESULTS".to_string(),
        })
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGeocoder;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{GeocodeError, Geocoder, SERVICE};
    use crate::types::Coordinates;
    use crate::upstream::UpstreamError;

    /// [`Geocoder`] with fixed answers; unknown addresses are `ZERO_RESULTS`.
    #[derive(Debug, Default)]
    pub struct MockGeocoder {
        coords: HashMap<String, Coordinates>,
        unavailable: HashSet<String>,
        calls: AtomicUsize,
    }

    impl MockGeocoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_coords(mut self, address: impl Into<String>, lat: f64, lon: f64) -> Self {
            self.coords
                .insert(address.into(), Coordinates::new(lat, lon));
            self
        }

        /// Makes lookups of `address` fail with HTTP 500.
        pub fn unavailable_for(mut self, address: impl Into<String>) -> Self {
            self.unavailable.insert(address.into());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.contains(address) {
                return Err(GeocodeError::Upstream(UpstreamError::Status {
                    service: SERVICE,
                    status: 500,
                }));
            }
            self.coords
                .get(address)
                .copied()
                .ok_or_else(|| GeocodeError::NoMatch {
                    status: "ZERO_RESULTS".to_string(),
                })
        }
    }
}
