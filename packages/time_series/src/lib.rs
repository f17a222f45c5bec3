#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Program-year partitioned time-series index.
//!
//! Each unit's data points are stored in one file per program year under
//! `time-series/unit_{id}/`. Points are upserted by date, so re-running a
//! computation for the same snapshot replaces rather than duplicates its
//! point. All writes go through the shared atomic-write primitive.

use std::sync::LazyLock;

use chrono::{Datelike as _, NaiveDate, Utc};
use district_stats_store::{CacheLayout, StoreError, read_json_optional, write_json_atomic};
use district_stats_time_series_models::{
    ProgramYearIndexFile, ProgramYearSummary, TimeSeriesDataPoint, TimeSeriesIndexMetadata,
};
use regex::Regex;

static UNIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap_or_else(|_| unreachable!()));

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap_or_else(|_| unreachable!())
});

static PARTITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{4})\.json$").unwrap_or_else(|_| unreachable!())
});

/// Errors that can occur while reading or writing the time-series index.
#[derive(Debug, thiserror::Error)]
pub enum TimeSeriesError {
    /// The unit ID is empty or contains non-alphanumeric characters.
    #[error("Invalid unit ID {0:?}: must be non-empty and alphanumeric")]
    InvalidUnitId(String),

    /// The date is not a valid `YYYY-MM-DD` date.
    #[error("Invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Reading or writing a partition failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A program year (July 1 through June 30), identified by the calendar
/// year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProgramYear {
    /// Calendar year of the July 1 start.
    pub start_year: i32,
}

impl ProgramYear {
    /// The program year containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 7 {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    /// The cycle immediately before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self {
            start_year: self.start_year - 1,
        }
    }

    /// Label used as the partition file name, e.g. `2024-2025`.
    #[must_use]
    pub fn label(self) -> String {
        format!("{}-{}", self.start_year, self.start_year + 1)
    }

    /// July 1 of the first year.
    #[must_use]
    pub fn start_date(self) -> String {
        format!("{:04}-07-01", self.start_year)
    }

    /// June 30 of the second year.
    #[must_use]
    pub fn end_date(self) -> String {
        format!("{:04}-06-30", self.start_year + 1)
    }

    /// Whether `date` falls inside this cycle.
    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        Self::containing(date) == self
    }
}

/// Validates a unit ID used as a path component.
///
/// # Errors
///
/// Returns [`TimeSeriesError::InvalidUnitId`] for empty or
/// non-alphanumeric IDs.
pub fn validate_unit_id(unit_id: &str) -> Result<(), TimeSeriesError> {
    if UNIT_ID_RE.is_match(unit_id) {
        Ok(())
    } else {
        Err(TimeSeriesError::InvalidUnitId(unit_id.to_owned()))
    }
}

/// Parses a strict `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`TimeSeriesError::InvalidDate`] if the shape or the calendar
/// date is invalid.
pub fn parse_point_date(date: &str) -> Result<NaiveDate, TimeSeriesError> {
    if !DATE_RE.is_match(date) {
        return Err(TimeSeriesError::InvalidDate(date.to_owned()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| TimeSeriesError::InvalidDate(date.to_owned()))
}

/// The program year label (`YYYY-YYYY`) for a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`TimeSeriesError::InvalidDate`] if `date` is invalid.
pub fn program_year_for(date: &str) -> Result<String, TimeSeriesError> {
    Ok(ProgramYear::containing(parse_point_date(date)?).label())
}

/// Reads and writes one cache directory's time-series partitions.
#[derive(Debug, Clone)]
pub struct TimeSeriesIndex {
    layout: CacheLayout,
}

impl TimeSeriesIndex {
    #[must_use]
    pub const fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// Upserts `point` into its program-year partition.
    ///
    /// The point replaces any existing point with the same date. The
    /// partition's points are re-sorted and its summary recomputed before
    /// the file is atomically rewritten.
    ///
    /// # Errors
    ///
    /// * [`TimeSeriesError::InvalidUnitId`] / [`TimeSeriesError::InvalidDate`]
    ///   before anything is read or written
    /// * [`TimeSeriesError::Store`] if the partition cannot be read or written
    pub fn write_data_point(
        &self,
        unit_id: &str,
        point: TimeSeriesDataPoint,
    ) -> Result<ProgramYearIndexFile, TimeSeriesError> {
        validate_unit_id(unit_id)?;
        let date = parse_point_date(&point.date)?;
        let program_year = ProgramYear::containing(date);
        let label = program_year.label();

        let mut partition = self
            .read_program_year(unit_id, &label)?
            .unwrap_or_else(|| ProgramYearIndexFile {
                unit_id: unit_id.to_owned(),
                program_year: label.clone(),
                start_date: program_year.start_date(),
                end_date: program_year.end_date(),
                data_points: Vec::new(),
                summary: ProgramYearSummary::default(),
                last_updated: String::new(),
            });

        if let Some(existing) = partition
            .data_points
            .iter_mut()
            .find(|p| p.date == point.date)
        {
            *existing = point;
        } else {
            partition.data_points.push(point);
        }
        partition.data_points.sort_by(|a, b| a.date.cmp(&b.date));
        partition.summary = ProgramYearSummary::from_points(&partition.data_points);
        partition.last_updated = Utc::now().to_rfc3339();

        write_json_atomic(&self.layout.program_year_path(unit_id, &label), &partition)?;
        log::debug!(
            "Unit {unit_id}: time series {label} now has {} point(s)",
            partition.data_points.len()
        );

        Ok(partition)
    }

    /// Rescans a unit's partitions and rewrites its index metadata.
    ///
    /// # Errors
    ///
    /// * [`TimeSeriesError::InvalidUnitId`] for an invalid unit ID
    /// * [`TimeSeriesError::Store`] if a partition cannot be read or the
    ///   metadata cannot be written
    pub fn update_metadata(
        &self,
        unit_id: &str,
    ) -> Result<TimeSeriesIndexMetadata, TimeSeriesError> {
        validate_unit_id(unit_id)?;

        let available_program_years = self.list_program_years(unit_id);
        let mut total_data_points = 0;
        for label in &available_program_years {
            if let Some(partition) = self.read_program_year(unit_id, label)? {
                total_data_points += partition.data_points.len();
            }
        }

        let metadata = TimeSeriesIndexMetadata {
            unit_id: unit_id.to_owned(),
            available_program_years,
            total_data_points,
            last_updated: Utc::now().to_rfc3339(),
        };
        write_json_atomic(&self.layout.time_series_metadata_path(unit_id), &metadata)?;

        Ok(metadata)
    }

    /// Reads one program-year partition, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// * [`TimeSeriesError::InvalidUnitId`] for an invalid unit ID
    /// * [`TimeSeriesError::Store`] if the file exists but cannot be parsed
    pub fn read_program_year(
        &self,
        unit_id: &str,
        program_year: &str,
    ) -> Result<Option<ProgramYearIndexFile>, TimeSeriesError> {
        validate_unit_id(unit_id)?;
        Ok(read_json_optional(
            &self.layout.program_year_path(unit_id, program_year),
        )?)
    }

    /// Program-year labels with a partition on disk, sorted
    /// chronologically.
    #[must_use]
    pub fn list_program_years(&self, unit_id: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.layout.time_series_unit_dir(unit_id)) else {
            return Vec::new();
        };

        let mut years: Vec<(i32, String)> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .filter_map(|name| {
                let caps = PARTITION_RE.captures(&name)?;
                let start: i32 = caps[1].parse().ok()?;
                let end: i32 = caps[2].parse().ok()?;
                (end == start + 1).then(|| (start, format!("{start}-{end}")))
            })
            .collect();

        years.sort();
        years.into_iter().map(|(_, label)| label).collect()
    }
}
