use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors returned by the result cache and its blob stores.
pub enum CacheError {
    /// No object at the path.
    #[error("cache entry not found: {path}")]
    NotFound {
        /// Object path.
        path: String,
    },

    /// Stored object could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object path cannot be mapped onto the backend.
    #[error("invalid object path: {path}")]
    InvalidPath {
        /// Object path.
        path: String,
    },

    /// Remote backend call failed.
    #[error("{backend} backend error: {reason}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// Failure detail.
        reason: String,
    },

    /// Local storage root is missing or unusable.
    #[error("cache path unavailable: {path}")]
    StorageUnavailable {
        /// Root path.
        path: PathBuf,
    },

    /// IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
