use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{CacheError, CacheResult};
use super::store::BlobStore;

/// In-memory [`BlobStore`] with per-operation call counters.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    exists_calls: AtomicUsize,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `put` fail as an unavailable backend.
    pub fn failing_puts(self) -> Self {
        self.fail_puts.store(true, Ordering::SeqCst);
        self
    }

    /// Stores raw bytes without going through the cache.
    pub fn insert_raw(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.lock().insert(path.to_string(), bytes.into());
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists_prefix(&self, prefix: &str) -> CacheResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().keys().any(|k| k.starts_with(prefix)))
    }

    async fn get(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().get(path).cloned())
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> CacheResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                backend: "memory",
                reason: "writes disabled".to_string(),
            });
        }
        self.objects.lock().insert(path.to_string(), bytes);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
