//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric setting could not be parsed or is out of range.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Unknown cache backend name.
    #[error("unknown cache backend '{value}' (expected 'gcs' or 'local')")]
    UnknownCacheBackend { value: String },

    /// A required setting was not provided.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },

    /// A URL setting is not an absolute http(s) URL.
    #[error("invalid URL for {name}: '{value}'")]
    InvalidUrl { name: &'static str, value: String },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
