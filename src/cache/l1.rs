//! In-memory tier in front of the blob store.
//!
//! Keyed by object path; holds decoded entries so repeated hits skip both the
//! network and JSON parsing.

use moka::sync::Cache;
use std::sync::Arc;

use crate::types::CacheEntry;

/// Bounded in-memory map from object path to decoded [`CacheEntry`].
pub struct L1Cache {
    entries: Cache<String, Arc<CacheEntry>>,
}

impl L1Cache {
    /// Creates a cache with a max entry capacity (LRU eviction).
    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    #[inline]
    pub fn get(&self, path: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(path)
    }

    #[inline]
    pub fn insert(&self, path: &str, entry: CacheEntry) {
        self.entries.insert(path.to_string(), Arc::new(entry));
    }

    #[inline]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[inline]
    pub fn remove(&self, path: &str) {
        self.entries.invalidate(path);
    }

    /// Returns the number of cached entries.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Returns `true` if the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Runs any pending maintenance tasks in the underlying cache.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl std::fmt::Debug for L1Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
