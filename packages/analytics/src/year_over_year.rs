//! Year-over-year comparison against the prior program year.

use chrono::{Months, NaiveDate};
use district_stats_analytics_models::{MetricChange, YearOverYearAnalytics, YearOverYearMetrics};
use district_stats_snapshot::closing_period::parse_date;
use district_stats_snapshot_models::UnitSnapshot;
use district_stats_store::CacheLayout;
use district_stats_time_series::ProgramYear;

use crate::round1;

/// Finds the snapshot to compare `snapshot_date` against: the latest
/// snapshot date on or before the same calendar date one year earlier
/// that lies in the previous program year and contains `unit_id`.
#[must_use]
pub fn find_prior_snapshot_date(
    layout: &CacheLayout,
    snapshot_date: NaiveDate,
    unit_id: &str,
) -> Option<String> {
    let target = snapshot_date.checked_sub_months(Months::new(12))?;
    let previous_year = ProgramYear::containing(snapshot_date).previous();

    layout
        .list_snapshot_dates()
        .into_iter()
        .rev()
        .filter_map(|key| parse_date(&key).map(|date| (key, date)))
        .filter(|(_, date)| *date <= target && previous_year.contains(*date))
        .find(|(key, _)| layout.unit_snapshot_path(key, unit_id).is_file())
        .map(|(key, _)| key)
}

fn change(current: u32, previous: u32) -> MetricChange {
    let delta = i64::from(current) - i64::from(previous);
    #[allow(clippy::cast_precision_loss)]
    let percentage_change =
        (previous > 0).then(|| round1(delta as f64 / f64::from(previous) * 100.0));

    MetricChange {
        current,
        previous,
        change: delta,
        percentage_change,
    }
}

/// Compares `current` with the prior-year snapshot, if any.
#[must_use]
pub fn compare(
    current: &UnitSnapshot,
    prior: Option<(&str, &UnitSnapshot)>,
) -> YearOverYearAnalytics {
    let Some((prior_date, prior)) = prior else {
        return YearOverYearAnalytics::unavailable();
    };

    let now = &current.totals;
    let then = &prior.totals;

    YearOverYearAnalytics {
        available: true,
        message: None,
        previous_snapshot_date: Some(prior_date.to_owned()),
        metrics: Some(YearOverYearMetrics {
            membership: change(now.total_membership, then.total_membership),
            payments: change(now.total_payments, then.total_payments),
            clubs: change(now.total_clubs, then.total_clubs),
            distinguished_clubs: change(now.distinguished_clubs, then.distinguished_clubs),
            dcp_goals: change(now.total_dcp_goals, then.total_dcp_goals),
        }),
    }
}

#[cfg(test)]
mod tests {
    use district_stats_snapshot_models::{SCHEMA_VERSION, UnitTotals};

    use super::*;

    fn snapshot(
        date: NaiveDate,
        membership: u32,
        payments: u32,
        distinguished: u32,
    ) -> UnitSnapshot {
        UnitSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            unit_id: "42".to_string(),
            snapshot_date: date,
            clubs: Vec::new(),
            divisions: Vec::new(),
            areas: Vec::new(),
            totals: UnitTotals {
                total_clubs: 100,
                paid_clubs: 98,
                total_membership: membership,
                membership_base: membership,
                total_payments: payments,
                total_dcp_goals: 300,
                distinguished_clubs: distinguished,
            },
        }
    }

    fn touch(layout: &CacheLayout, date: &str, unit_id: &str) {
        let path = layout.unit_snapshot_path(date, unit_id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "{}").unwrap();
    }

    #[test]
    fn deltas_and_percentages() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let prior_date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let current = snapshot(date, 2200, 4000, 30);
        let prior = snapshot(prior_date, 2000, 4000, 0);

        let yoy = compare(&current, Some(("2024-01-31", &prior)));
        assert!(yoy.available);
        assert_eq!(yoy.previous_snapshot_date.as_deref(), Some("2024-01-31"));
        let metrics = yoy.metrics.unwrap();
        assert_eq!(metrics.membership.change, 200);
        assert_eq!(metrics.membership.percentage_change, Some(10.0));
        assert_eq!(metrics.payments.percentage_change, Some(0.0));
        assert_eq!(metrics.distinguished_clubs.change, 30);
        assert_eq!(metrics.distinguished_clubs.percentage_change, None);
    }

    #[test]
    fn missing_prior_is_insufficient_history() {
        let current = snapshot(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(), 1, 1, 1);
        let yoy = compare(&current, None);
        assert!(!yoy.available);
        assert_eq!(yoy.message.as_deref(), Some("insufficient historical data"));
        assert!(yoy.metrics.is_none());
    }

    #[test]
    fn prior_snapshot_selection() {
        let root = std::env::temp_dir().join("district_stats_yoy_prior");
        let _ = std::fs::remove_dir_all(&root);
        let layout = CacheLayout::new(&root);

        touch(&layout, "2023-06-30", "42");
        touch(&layout, "2024-01-15", "42");
        touch(&layout, "2024-01-31", "7");
        touch(&layout, "2024-02-15", "42");
        touch(&layout, "2025-01-31", "42");

        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            find_prior_snapshot_date(&layout, date, "42").as_deref(),
            Some("2024-01-15")
        );
        assert_eq!(
            find_prior_snapshot_date(&layout, date, "7").as_deref(),
            Some("2024-01-31")
        );
        assert_eq!(find_prior_snapshot_date(&layout, date, "99"), None);

        // 2023-06-30 is two program years back.
        let early = NaiveDate::from_ymd_opt(2024, 7, 31).unwrap();
        assert_eq!(find_prior_snapshot_date(&layout, early, "42"), None);

        let _ = std::fs::remove_dir_all(&root);
    }
}
