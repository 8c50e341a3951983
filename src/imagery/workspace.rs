//! Request-scoped scratch space for fetched imagery.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::hashing::LocationKey;

const WORKING_AREA_PREFIX: &str = "solarscan-";

/// Scratch directory owned by exactly one pipeline run.
///
/// Files are named by [`LocationKey`], never by address. [`WorkingArea::close`]
/// removes every file and the directory itself; dropping without closing also
/// removes it, but swallows errors.
#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    /// Creates a uniquely named directory under `root` (created if missing).
    pub fn create_in(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKING_AREA_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Working area created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path where the snapshot for `key` is stored.
    pub fn snapshot_path(&self, key: &LocationKey) -> PathBuf {
        self.dir.path().join(key.file_name())
    }

    /// Writes `bytes` as the snapshot for `key`, overwriting any previous one.
    pub async fn persist(&self, key: &LocationKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.snapshot_path(key);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Names of the files currently in the working area, sorted.
    pub fn file_names(&self) -> io::Result<Vec<String>> {
        let mut names = std::fs::read_dir(self.dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Removes the working area and everything in it.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "Working area cleared");
        Ok(())
    }
}
