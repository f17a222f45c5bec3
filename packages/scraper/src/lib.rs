#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collection of raw dashboard reports into the cache directory.
//!
//! The [`orchestrator::Orchestrator`] walks the configured units one at a
//! time, fetching each unit's reports through a [`fetcher::Fetcher`]
//! wrapped in a shared circuit breaker and a bounded retry. Results land in
//! `raw-csv/{date}/` where the snapshot transform picks them up.

pub mod fetcher;
pub mod http;
pub mod orchestrator;
pub mod progress;
pub mod registry;

use district_stats_store::StoreError;

pub use fetcher::{FetchedReport, Fetcher, ReportType};
pub use http::HttpCsvFetcher;
pub use orchestrator::{Orchestrator, ScrapeOptions, ScrapeResult, SkipReason, SkippedUnit};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use registry::{UnitConfig, UnitRegistry};

/// Errors returned by a [`Fetcher`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// `true` for failures worth retrying: timeouts, connection errors,
    /// rate limiting, and server errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Parse(_) => false,
        }
    }
}

/// Errors that abort a whole collection run.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The unit configuration could not be parsed.
    #[error("Invalid unit configuration: {0}")]
    Registry(#[from] toml::de::Error),

    /// No units were configured or requested.
    #[error("No units to collect")]
    NoUnits,

    /// Reading or writing a cache artifact failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let status = |status| FetchError::Status {
            status,
            url: "http://dashboard.test/club-performance.csv".to_string(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
        assert!(!FetchError::Parse("bad header".to_string()).is_transient());
    }
}
