//! Closing-period detection.
//!
//! For a few days after a month ends, the dashboard keeps publishing the
//! finalized figures for that month. Data collected on, say, `2025-01-05`
//! with a data month of `2024-12` therefore describes December and is filed
//! under `2024-12-31`. Both the snapshot transform and the analytics engine
//! resolve dates through [`detect`] so they always agree on where a month's
//! data lives.

use chrono::{Datelike as _, NaiveDate};
use district_stats_snapshot_models::{CacheMetadata, ClosingPeriodInfo};

/// A calendar month parsed from collector metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataMonth {
    /// Four-digit year.
    pub year: i32,
    /// Month number (1-12).
    pub month: u32,
}

impl std::fmt::Display for DataMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Gregorian leap-year rule.
#[must_use]
pub const fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Returns the last calendar day of `month` in `year`, or `None` if the
/// month is out of range.
#[must_use]
pub const fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        4 | 6 | 9 | 11 => Some(30),
        2 if is_leap_year(year) => Some(29),
        2 => Some(28),
        _ => None,
    }
}

/// Parses a data month in `YYYY-MM` or bare `MM` form.
///
/// A bare month is placed in `reference_year`, unless it is later than
/// `reference_month`, in which case it belongs to the previous year
/// (December data collected in January).
#[must_use]
pub fn parse_data_month(raw: &str, reference_year: i32, reference_month: u32) -> Option<DataMonth> {
    let raw = raw.trim();

    let (year, month) = if let Some((year_str, month_str)) = raw.split_once('-') {
        if year_str.len() != 4 || month_str.is_empty() || month_str.len() > 2 {
            return None;
        }
        (year_str.parse::<i32>().ok()?, parse_month(month_str)?)
    } else {
        if raw.is_empty() || raw.len() > 2 {
            return None;
        }
        let month = parse_month(raw)?;
        let year = if month > reference_month {
            reference_year - 1
        } else {
            reference_year
        };
        (year, month)
    };

    Some(DataMonth { year, month })
}

fn parse_month(s: &str) -> Option<u32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|m| (1..=12).contains(m))
}

/// Parses a strict `YYYY-MM-DD` date.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if !district_stats_store::paths::is_iso_date_key(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Resolves the canonical snapshot date for `requested_date`.
///
/// Falls back to a non-closing result (every date equal to
/// `requested_date`) when metadata is absent, does not flag a closing
/// period, carries no parseable data month, or when `requested_date`
/// itself is invalid.
#[must_use]
pub fn detect(requested_date: &str, metadata: Option<&CacheMetadata>) -> ClosingPeriodInfo {
    let Some(requested) = parse_date(requested_date) else {
        log::warn!("Invalid requested date {requested_date:?}, using it as-is");
        return not_closing(requested_date);
    };

    let Some(metadata) = metadata else {
        return not_closing(requested_date);
    };

    if metadata.is_closing_period != Some(true) {
        return not_closing(requested_date);
    }

    let Some(raw_month) = metadata.data_month.as_deref() else {
        log::warn!("{requested_date}: closing period flagged without a data month");
        return not_closing(requested_date);
    };

    let Some(data_month) = parse_data_month(raw_month, requested.year(), requested.month()) else {
        log::warn!("{requested_date}: unparseable data month {raw_month:?}");
        return not_closing(requested_date);
    };

    let Some(snapshot_date) = last_day_of_month(data_month.year, data_month.month)
        .and_then(|day| NaiveDate::from_ymd_opt(data_month.year, data_month.month, day))
    else {
        return not_closing(requested_date);
    };

    let snapshot_date = snapshot_date.format("%Y-%m-%d").to_string();
    log::info!(
        "{requested_date}: closing period detected, filing {data_month} data under {snapshot_date}"
    );

    ClosingPeriodInfo {
        is_closing_period: true,
        data_month: data_month.to_string(),
        collection_date: requested_date.to_owned(),
        snapshot_date: snapshot_date.clone(),
        logical_date: snapshot_date,
    }
}

fn not_closing(requested_date: &str) -> ClosingPeriodInfo {
    ClosingPeriodInfo {
        is_closing_period: false,
        data_month: requested_date.get(..7).unwrap_or(requested_date).to_owned(),
        collection_date: requested_date.to_owned(),
        snapshot_date: requested_date.to_owned(),
        logical_date: requested_date.to_owned(),
    }
}
