use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::{CacheError, CacheResult};

const TEMP_SUFFIX: &str = ".json.tmp";

#[async_trait]
/// Object storage holding serialized cache entries under slash-separated paths.
pub trait BlobStore: Send + Sync {
    /// Returns `true` if at least one object starts with `prefix`.
    async fn exists_prefix(&self, prefix: &str) -> CacheResult<bool>;

    /// Returns the object bytes, or `None` if absent.
    async fn get(&self, path: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Creates or replaces the object.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> CacheResult<()>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// [`BlobStore`] on a local directory. Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if needed.
    pub fn ensure_root(&self) -> CacheResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|_| CacheError::StorageUnavailable {
            path: self.root.clone(),
        })
    }

    /// Maps an object path below the root, refusing anything that would escape it.
    pub fn resolve(&self, path: &str) -> CacheResult<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(CacheError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn exists_prefix(&self, prefix: &str) -> CacheResult<bool> {
        let path = self.resolve(prefix)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn get(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.resolve(path)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let final_path = self.resolve(path)?;
        let dir = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).await?;

        tokio::task::spawn_blocking(move || write_replacing(&dir, &final_path, &bytes))
            .await
            .map_err(|e| CacheError::Backend {
                backend: "local",
                reason: e.to_string(),
            })?
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Writes `bytes` to a uniquely named temp file in `dir`, then renames it over
/// `final_path`. Concurrent writers never share a temp file.
fn write_replacing(dir: &Path, final_path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut file = tempfile::Builder::new()
        .prefix(".")
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(final_path).map_err(|e| e.error)?;
    Ok(())
}
