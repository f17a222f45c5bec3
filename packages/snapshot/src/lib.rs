#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Versioned snapshot cache for district statistics.
//!
//! Turns raw collector output (`raw-csv/{date}/unit-{id}/`) into per-unit
//! [`UnitSnapshot`] files filed under the canonical snapshot date resolved
//! by [`closing_period::detect`], alongside run metadata, a manifest, and
//! the monotonic "latest successful" pointer.
//!
//! Writes go through the shared atomic-write primitive in
//! [`district_stats_store`], so readers never see partial files.

pub mod builder;
pub mod closing_period;
pub mod pointer;
pub mod transform;

use district_stats_snapshot_models::{CacheMetadata, SnapshotRunMetadata, UnitSnapshot};
use district_stats_store::{CacheLayout, StoreError, read_json_optional};

pub use builder::{CsvStatisticsBuilder, StatisticsBuilder};
pub use transform::{TransformOptions, TransformResult, TransformService};

/// Errors that can occur during snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Reading or writing a cache artifact failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A raw file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A raw CSV report is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raw content could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A unit's raw input is missing.
    #[error("No raw input for unit {unit_id} at {path}")]
    MissingRawInput {
        /// Unit identifier.
        unit_id: String,
        /// Expected location of the raw input.
        path: String,
    },

    /// No raw input exists for any requested unit.
    #[error("No raw data found for {date} at {path}")]
    NoRawData {
        /// Requested collection date.
        date: String,
        /// Raw directory that was searched.
        path: String,
    },

    /// A date argument is not a valid `YYYY-MM-DD` date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A unit ID contains characters other than ASCII letters and digits.
    #[error("Invalid unit ID: {0:?}")]
    InvalidUnitId(String),

    /// Built content disagrees with the location it is being filed under.
    #[error("Snapshot for unit {unit_id} is dated {actual}, expected {expected}")]
    DateMismatch {
        /// Unit identifier.
        unit_id: String,
        /// Directory date.
        expected: String,
        /// Date inside the built snapshot.
        actual: String,
    },
}

/// Returns `true` if `unit_id` is non-empty ASCII alphanumeric.
#[must_use]
pub fn is_valid_unit_id(unit_id: &str) -> bool {
    !unit_id.is_empty() && unit_id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Reads collector metadata for a raw collection date.
///
/// Returns `None` when the file is missing. An unreadable file is logged
/// and also treated as missing, which degrades to non-closing-period
/// behavior.
#[must_use]
pub fn read_cache_metadata(layout: &CacheLayout, date: &str) -> Option<CacheMetadata> {
    match read_json_optional(&layout.raw_metadata_path(date)) {
        Ok(metadata) => metadata,
        Err(e) => {
            log::warn!("Ignoring unreadable collector metadata for {date}: {e}");
            None
        }
    }
}

/// Reads the run metadata for a snapshot date.
///
/// # Errors
///
/// Returns [`SnapshotError::Store`] if the file exists but cannot be parsed.
pub fn read_run_metadata(
    layout: &CacheLayout,
    snapshot_date: &str,
) -> Result<Option<SnapshotRunMetadata>, SnapshotError> {
    Ok(read_json_optional(
        &layout.snapshot_metadata_path(snapshot_date),
    )?)
}

/// Reads one unit's snapshot, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns [`SnapshotError::Store`] if the file exists but cannot be parsed.
pub fn read_unit_snapshot(
    layout: &CacheLayout,
    snapshot_date: &str,
    unit_id: &str,
) -> Result<Option<UnitSnapshot>, SnapshotError> {
    Ok(read_json_optional(
        &layout.unit_snapshot_path(snapshot_date, unit_id),
    )?)
}
