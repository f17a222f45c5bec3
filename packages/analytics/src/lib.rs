#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analytics compute engine.
//!
//! Derives per-unit analytics artifacts (membership trends, club health,
//! distinguished projections, leadership rollups, club trend index,
//! year-over-year comparison, rankings, and a summary) from the snapshot
//! cache. Each unit is recomputed only when the SHA-256 of its snapshot
//! file differs from the checksum recorded in its summary artifact.

pub mod artifact;
pub mod club_health;
pub mod distinguished;
pub mod engine;
pub mod leadership;
pub mod rankings;
pub mod trends;
pub mod year_over_year;

use district_stats_store::StoreError;
use district_stats_time_series::TimeSeriesError;

pub use engine::{AnalyticsComputeEngine, ComputeOptions, ComputeResult};

/// Errors that can occur during analytics computation.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// A date argument is not a valid `YYYY-MM-DD` date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// No snapshot exists at the resolved date.
    #[error("{}", snapshot_not_found(.requested, .resolved, .closing_period_adjusted))]
    SnapshotNotFound {
        /// Date the caller asked for.
        requested: String,
        /// Date after closing-period resolution.
        resolved: String,
        /// Whether `resolved` differs from `requested` because of a
        /// closing period.
        closing_period_adjusted: bool,
    },

    /// A unit ID contains characters other than ASCII letters and digits.
    #[error("Invalid unit ID: {0:?}")]
    InvalidUnitId(String),

    /// The requested unit has no snapshot file on the resolved date.
    #[error("No snapshot for unit {unit_id} on {snapshot_date}")]
    UnitSnapshotMissing {
        /// Unit identifier.
        unit_id: String,
        /// Resolved snapshot date.
        snapshot_date: String,
    },

    /// Raw input could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reading or writing a cache artifact failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Updating the time-series index failed.
    #[error(transparent)]
    TimeSeries(#[from] TimeSeriesError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn snapshot_not_found(requested: &str, resolved: &str, closing_period_adjusted: &bool) -> String {
    if *closing_period_adjusted {
        format!(
            "No snapshot found for {resolved} (closing-period adjustment applied: \
             data collected {requested} belongs to {resolved})"
        )
    } else {
        format!("No snapshot found for {requested}")
    }
}

/// Rounds to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Arithmetic mean, or zero for no values.
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// `part / whole * 100`, or zero when `whole` is zero.
pub(crate) fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}
