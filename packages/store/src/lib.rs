#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared storage primitives for the district stats cache directory.
//!
//! Every writer in the toolchain (snapshot transform, analytics engine,
//! time-series index, collection orchestrator) goes through
//! [`write_atomic`] / [`write_json_atomic`] so a concurrent reader never
//! observes a partially written file. [`CacheLayout`] is the single source
//! of truth for where each artifact lives on disk.

pub mod atomic;
pub mod checksum;
pub mod paths;

pub use atomic::{read_json_optional, write_atomic, write_json_atomic};
pub use checksum::{file_sha256, sha256_hex};
pub use paths::CacheLayout;

/// Errors that can occur while reading or writing cache artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that was being read or written.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error at {path}: {source}")]
    Json {
        /// Path of the offending file.
        path: String,
        /// Underlying serde error.
        source: serde_json::Error,
    },

    /// The target path has no file name component.
    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}
