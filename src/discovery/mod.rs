//! Address discovery against an OpenStreetMap Overpass interpreter.
//!
//! One query per request, scoped to postal code and city and filtered to
//! `building=house` footprints. A failed discovery is fatal to the request:
//! without addresses there is nothing to rank.

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockAddressSource;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::constants::OVERPASS_QUERY_TIMEOUT_SECS;
use crate::types::{Address, LocationQuery};
use crate::upstream::{UpstreamResult, http_client, json_body, send_checked};

const SERVICE: &str = "overpass";

#[async_trait]
/// Source of candidate residential addresses for a location.
pub trait AddressSource: Send + Sync {
    /// Returns every address found for `query`; empty when nothing matches.
    async fn discover(&self, query: &LocationQuery) -> UpstreamResult<Vec<Address>>;
}

/// [`AddressSource`] backed by the Overpass API.
#[derive(Debug, Clone)]
pub struct OverpassSource {
    url: String,
    http: HttpClient,
}

impl OverpassSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            url: url.into(),
            http: http_client(SERVICE, timeout)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AddressSource for OverpassSource {
    #[instrument(skip(self, query), fields(zip = %query.zip_code, state = %query.state))]
    async fn discover(&self, query: &LocationQuery) -> UpstreamResult<Vec<Address>> {
        let body = build_query(query);
        let request = self.http.post(&self.url).form(&[("data", body)]);

        let response = send_checked(SERVICE, request).await?;
        let payload: OverpassResponse = json_body(SERVICE, response).await?;

        let addresses = addresses_from_elements(query, &payload.elements);
        info!(
            elements = payload.elements.len(),
            addresses = addresses.len(),
            "Address discovery complete"
        );
        Ok(addresses)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverpassResponse {
    #[serde(default)]
    pub(crate) elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverpassElement {
    #[serde(default)]
    pub(crate) tags: HashMap<String, String>,
}

/// Builds the Overpass QL query for `query`.
pub fn build_query(query: &LocationQuery) -> String {
    format!(
        "[out:json][timeout:{timeout}];\n\
         nwr[\"building\"=\"house\"][\"addr:postcode\"=\"{zip}\"][\"addr:city\"=\"{city}\"];\n\
         out geom;",
        timeout = OVERPASS_QUERY_TIMEOUT_SECS,
        zip = escape_ql(&query.zip_code),
        city = escape_ql(&query.city),
    )
}

fn escape_ql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn addresses_from_elements(
    query: &LocationQuery,
    elements: &[OverpassElement],
) -> Vec<Address> {
    elements
        .iter()
        .filter_map(|element| {
            let number = element.tags.get("addr:housenumber");
            let street = element.tags.get("addr:street");
            match (number, street) {
                (Some(number), Some(street)) => Some(query.address_for(number, street)),
                _ => {
                    debug!("Skipping element without house number or street");
                    None
                }
            }
        })
        .collect()
}
