#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-series index types.
//!
//! A unit's history is partitioned by program year (July 1 through
//! June 30) into one [`ProgramYearIndexFile`] per cycle, with a
//! [`TimeSeriesIndexMetadata`] summarizing the available partitions.

use serde::{Deserialize, Serialize};

/// Club counts by health classification on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubCounts {
    pub total: u32,
    pub thriving: u32,
    pub vulnerable: u32,
    pub intervention_required: u32,
}

/// One dated measurement of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesDataPoint {
    /// Measurement date (`YYYY-MM-DD`), the upsert key.
    pub date: String,
    /// Snapshot the point was derived from.
    pub snapshot_id: String,
    pub membership: u32,
    pub payments: u32,
    pub dcp_goals: u32,
    pub distinguished_total: u32,
    pub club_counts: ClubCounts,
}

/// Membership summary over one partition's data points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramYearSummary {
    pub total_data_points: usize,
    /// Membership at the earliest point.
    pub membership_start: u32,
    /// Membership at the latest point.
    pub membership_end: u32,
    pub membership_peak: u32,
    pub membership_low: u32,
}

impl ProgramYearSummary {
    /// Summarizes points already sorted ascending by date.
    #[must_use]
    pub fn from_points(points: &[TimeSeriesDataPoint]) -> Self {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Self::default();
        };

        let membership = points.iter().map(|p| p.membership);

        Self {
            total_data_points: points.len(),
            membership_start: first.membership,
            membership_end: last.membership,
            membership_peak: membership.clone().max().unwrap_or(0),
            membership_low: membership.min().unwrap_or(0),
        }
    }
}

/// One program year of a unit's time series
/// (`time-series/unit_{id}/{programYear}.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramYearIndexFile {
    pub unit_id: String,
    /// Cycle label, e.g. `2024-2025`.
    pub program_year: String,
    /// July 1 of the cycle's first year.
    pub start_date: String,
    /// June 30 of the cycle's second year.
    pub end_date: String,
    /// Sorted ascending, at most one point per date.
    pub data_points: Vec<TimeSeriesDataPoint>,
    pub summary: ProgramYearSummary,
    pub last_updated: String,
}

/// Cross-partition summary for one unit
/// (`time-series/unit_{id}/index-metadata.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesIndexMetadata {
    pub unit_id: String,
    /// Program years with a partition on disk, sorted chronologically.
    pub available_program_years: Vec<String>,
    pub total_data_points: usize,
    pub last_updated: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(date: &str, membership: u32) -> TimeSeriesDataPoint {
        TimeSeriesDataPoint {
            date: date.to_string(),
            snapshot_id: date.to_string(),
            membership,
            payments: 0,
            dcp_goals: 0,
            distinguished_total: 0,
            club_counts: ClubCounts::default(),
        }
    }

    #[test]
    fn summary_tracks_start_end_peak_low() {
        let points = vec![
            point("2024-07-31", 900),
            point("2024-10-31", 1100),
            point("2024-12-31", 850),
            point("2025-01-31", 950),
        ];
        let summary = ProgramYearSummary::from_points(&points);
        assert_eq!(summary.total_data_points, 4);
        assert_eq!(summary.membership_start, 900);
        assert_eq!(summary.membership_end, 950);
        assert_eq!(summary.membership_peak, 1100);
        assert_eq!(summary.membership_low, 850);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        assert_eq!(
            ProgramYearSummary::from_points(&[]),
            ProgramYearSummary::default()
        );
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(point("2024-07-31", 1)).unwrap();
        assert!(json.get("snapshotId").is_some());
        assert!(json["clubCounts"].get("interventionRequired").is_some());
    }
}
