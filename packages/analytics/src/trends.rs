//! Membership trend series and the per-club trend index.

use std::collections::{BTreeMap, HashMap};

use district_stats_analytics_models::{
    ClubHealth, ClubTrend, ClubTrendsAnalytics, MembershipAnalytics, TrendPoint,
};
use district_stats_snapshot_models::UnitSnapshot;
use district_stats_time_series::ProgramYear;
use district_stats_time_series_models::{ClubCounts, TimeSeriesDataPoint};

/// The time-series point describing `snapshot`.
#[must_use]
pub fn data_point(snapshot: &UnitSnapshot, counts: ClubCounts) -> TimeSeriesDataPoint {
    let date = snapshot.snapshot_date.format("%Y-%m-%d").to_string();
    TimeSeriesDataPoint {
        snapshot_id: date.clone(),
        date,
        membership: snapshot.totals.total_membership,
        payments: snapshot.totals.total_payments,
        dcp_goals: snapshot.totals.total_dcp_goals,
        distinguished_total: snapshot.totals.distinguished_clubs,
        club_counts: counts,
    }
}

/// Membership figures plus trend series for the snapshot's program year.
///
/// `history` is the stored partition for that program year; `current`
/// replaces any stored point with the same date.
#[must_use]
pub fn membership(
    snapshot: &UnitSnapshot,
    history: &[TimeSeriesDataPoint],
    current: &TimeSeriesDataPoint,
) -> MembershipAnalytics {
    let mut series: Vec<&TimeSeriesDataPoint> =
        history.iter().filter(|p| p.date != current.date).collect();
    series.push(current);
    series.sort_by(|a, b| a.date.cmp(&b.date));

    let program_year_change = series.first().map_or(0, |first| {
        i64::from(current.membership) - i64::from(first.membership)
    });

    let totals = &snapshot.totals;
    MembershipAnalytics {
        program_year: ProgramYear::containing(snapshot.snapshot_date).label(),
        total_membership: totals.total_membership,
        membership_base: totals.membership_base,
        net_growth: i64::from(totals.total_membership) - i64::from(totals.membership_base),
        new_members: snapshot.clubs.iter().map(|c| c.new_members).sum(),
        total_payments: totals.total_payments,
        program_year_change,
        membership_trend: series
            .iter()
            .map(|p| TrendPoint {
                date: p.date.clone(),
                value: p.membership,
            })
            .collect(),
        payments_trend: series
            .iter()
            .map(|p| TrendPoint {
                date: p.date.clone(),
                value: p.payments,
            })
            .collect(),
    }
}

/// Builds the club-keyed trend index. When a prior-year snapshot is
/// available, clubs present in both carry their prior membership.
#[must_use]
pub fn club_trends(
    snapshot: &UnitSnapshot,
    health: &[ClubHealth],
    prior: Option<&UnitSnapshot>,
) -> ClubTrendsAnalytics {
    let prior_members: HashMap<&str, u32> = prior
        .map(|p| {
            p.clubs
                .iter()
                .map(|c| (c.club_id.as_str(), c.active_members))
                .collect()
        })
        .unwrap_or_default();

    let clubs: BTreeMap<String, ClubTrend> = snapshot
        .clubs
        .iter()
        .zip(health)
        .map(|(club, club_health)| {
            let prior_year_members = prior_members.get(club.club_id.as_str()).copied();
            let trend = ClubTrend {
                club_name: club.club_name.clone(),
                division: club.division.clone(),
                area: club.area.clone(),
                active_members: club.active_members,
                net_growth: club.net_growth(),
                dcp_goals: club.dcp_goals,
                distinguished_level: club.distinguished_level,
                health_status: club_health.status,
                health_score: club_health.health_score,
                prior_year_members,
                membership_change: prior_year_members
                    .map(|prev| i64::from(club.active_members) - i64::from(prev)),
            };
            (club.club_id.clone(), trend)
        })
        .collect();

    ClubTrendsAnalytics { clubs }
}
