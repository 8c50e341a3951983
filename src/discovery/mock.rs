use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::AddressSource;
use crate::types::{Address, LocationQuery};
use crate::upstream::{UpstreamError, UpstreamResult};

/// In-memory [`AddressSource`] with a call counter.
#[derive(Debug, Default)]
pub struct MockAddressSource {
    addresses: Mutex<Option<Vec<Address>>>,
    calls: AtomicUsize,
}

impl MockAddressSource {
    /// Returns `addresses` for every query.
    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Address>,
    {
        Self {
            addresses: Mutex::new(Some(addresses.into_iter().map(Into::into).collect())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every query with a 503.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressSource for MockAddressSource {
    async fn discover(&self, _query: &LocationQuery) -> UpstreamResult<Vec<Address>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.addresses
            .lock()
            .clone()
            .ok_or(UpstreamError::Status {
                service: "overpass",
                status: 503,
            })
    }
}
