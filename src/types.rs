//! Records passed between pipeline stages.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hashing::LocationKey;

/// `"<house number> <street> <city> <state>"`.
pub type Address = String;

/// A `(zip_code, city, state)` lookup as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationQuery {
    pub zip_code: String,
    pub city: String,
    pub state: String,
}

impl LocationQuery {
    pub fn new(
        zip_code: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            zip_code: zip_code.into(),
            city: city.into(),
            state: state.into(),
        }
    }

    /// Formats a discovered building into the canonical [`Address`] form.
    pub fn address_for(&self, house_number: &str, street: &str) -> Address {
        format!(
            "{} {} {} {}",
            house_number.trim(),
            street.trim(),
            self.city,
            self.state
        )
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.state, self.zip_code, self.city)
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `"lat,lon"` as expected by map providers.
    pub fn as_center(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// A scored address, pre-selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub address: Address,
    /// Provider-defined suitability metric (max installable panels); ordering only.
    pub metric: f64,
    /// Full scoring payload as returned by the provider.
    pub solar_info: serde_json::Value,
}

/// Per selected address state gathered during ingestion.
#[derive(Debug, Clone)]
pub struct CoordinateRecord {
    pub coords: Option<Coordinates>,
    pub solar_info: serde_json::Value,
    pub hash: LocationKey,
}

/// Unit persisted in the result cache and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub has_solar: bool,
    pub has_pool: bool,
    pub base64_image: String,
}

/// Persisted result set for one `(state, zip, city)` query.
///
/// Ordered by address so serialization is byte-stable across runs.
pub type CacheEntry = BTreeMap<Address, ResponseRecord>;
