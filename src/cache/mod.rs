//! Persistent result cache keyed by `(state, zip_code, city)`.
//!
//! Entries are stored as pretty-printed JSON objects at
//! `"{state}/{zip_code}/{city}.json"` in a [`BlobStore`]. A bounded in-memory
//! tier ([`L1Cache`]) sits in front of the store and is filled on every read
//! and write.
//!
//! There is no cross-request locking: two concurrent misses for one key both
//! compute and the last write wins.

pub mod error;
pub mod gcs;
pub mod l1;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod store;


pub use error::{CacheError, CacheResult};
pub use gcs::GcsBlobStore;
pub use l1::L1Cache;
#[cfg(any(test, feature = "mock"))]
pub use mock::MemoryBlobStore;
pub use store::{BlobStore, LocalBlobStore};

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, instrument};

use crate::config::{CacheBackendKind, Config};
use crate::types::{CacheEntry, LocationQuery};

/// Identifies one cached result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub state: String,
    pub zip_code: String,
    pub city: String,
}

impl CacheKey {
    pub fn new(
        state: impl Into<String>,
        zip_code: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            zip_code: zip_code.into(),
            city: city.into(),
        }
    }

    /// `"{state}/{zip_code}/{city}.json"`.
    pub fn object_path(&self) -> String {
        format!("{}/{}/{}.json", self.state, self.zip_code, self.city)
    }
}

impl From<&LocationQuery> for CacheKey {
    fn from(query: &LocationQuery) -> Self {
        Self::new(&query.state, &query.zip_code, &query.city)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_path())
    }
}

/// Serializes an entry exactly as it is stored: JSON with 4-space indentation.
pub fn to_stored_json(entry: &CacheEntry) -> CacheResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    entry.serialize(&mut ser)?;
    Ok(out)
}

/// Result cache over a [`BlobStore`] with an in-memory tier.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn BlobStore>,
    memory: Arc<L1Cache>,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("store", &self.store.name())
            .field("memory", &self.memory)
            .finish()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn BlobStore>, memory_capacity: u64) -> Self {
        Self {
            store,
            memory: Arc::new(L1Cache::with_capacity(memory_capacity)),
        }
    }

    pub fn memory(&self) -> &L1Cache {
        &self.memory
    }

    /// Returns `true` if an entry is stored for `key`.
    ///
    /// Uses a prefix listing bounded to one result rather than a full read.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        let path = key.object_path();
        if self.memory.contains(&path) {
            return Ok(true);
        }
        self.store.exists_prefix(&path).await
    }

    /// Reads the entry for `key`; [`CacheError::NotFound`] when absent.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn read(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        let path = key.object_path();
        if let Some(entry) = self.memory.get(&path) {
            debug!("Memory tier hit");
            return Ok(entry.as_ref().clone());
        }

        let bytes = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| CacheError::NotFound { path: path.clone() })?;
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        self.memory.insert(&path, entry.clone());
        Ok(entry)
    }

    /// Stores `entry` under `key`, replacing any previous value.
    #[instrument(skip(self, entry), fields(key = %key, addresses = entry.len()))]
    pub async fn write(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        let path = key.object_path();
        let bytes = to_stored_json(entry)?;
        self.store.put(&path, bytes).await?;
        self.memory.insert(&path, entry.clone());
        debug!(backend = self.store.name(), "Cache entry written");
        Ok(())
    }
}

/// Builds the [`BlobStore`] selected by `config.cache_backend`.
pub fn build_blob_store(config: &Config) -> CacheResult<Arc<dyn BlobStore>> {
    match config.cache_backend {
        CacheBackendKind::Gcs => Ok(Arc::new(GcsBlobStore::new(
            config.gcs_bucket.clone(),
            config.gcs_token.clone(),
            config.request_timeout,
        )?)),
        CacheBackendKind::Local => {
            let store = LocalBlobStore::new(config.cache_path.clone());
            store.ensure_root()?;
            Ok(Arc::new(store))
        }
    }
}
