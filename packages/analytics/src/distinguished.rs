//! Distinguished-club counts and year-end projection.

use district_stats_analytics_models::{DistinguishedAnalytics, DistinguishedCounts};
use district_stats_snapshot_models::{DistinguishedLevel, UnitSnapshot};

use crate::{percentage, round1};

/// DCP goals needed for the lowest distinguished level.
const DISTINGUISHED_GOALS: u32 = 5;

/// How many goals short of Distinguished still counts as within reach.
const REACH: u32 = 2;

/// Counts clubs per distinguished level and projects the year-end total.
///
/// The projection adds every club within two goals of Distinguished that
/// already meets the membership requirement, capped at the club count.
#[must_use]
pub fn analyze(snapshot: &UnitSnapshot) -> DistinguishedAnalytics {
    let mut counts = DistinguishedCounts::default();
    let mut within_reach = Vec::new();

    for club in &snapshot.clubs {
        match club.distinguished_level {
            DistinguishedLevel::Smedley => counts.smedley += 1,
            DistinguishedLevel::Presidents => counts.presidents += 1,
            DistinguishedLevel::Select => counts.select += 1,
            DistinguishedLevel::Distinguished => counts.distinguished += 1,
            DistinguishedLevel::None => {
                if club.dcp_goals < DISTINGUISHED_GOALS
                    && club.dcp_goals + REACH >= DISTINGUISHED_GOALS
                    && club.meets_membership_requirement()
                {
                    within_reach.push(club.club_id.clone());
                }
            }
        }
    }
    counts.total = counts.smedley + counts.presidents + counts.select + counts.distinguished;

    let total_clubs = u32::try_from(snapshot.clubs.len()).unwrap_or(u32::MAX);
    let reach = u32::try_from(within_reach.len()).unwrap_or(u32::MAX);
    let projected_total = counts.total.saturating_add(reach).min(total_clubs);

    DistinguishedAnalytics {
        total_clubs,
        counts,
        distinguished_percentage: round1(percentage(counts.total, total_clubs)),
        within_reach,
        projected_total,
        projected_percentage: round1(percentage(projected_total, total_clubs)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use district_stats_snapshot_models::{ClubStatistics, SCHEMA_VERSION, UnitTotals};

    use super::*;

    fn club(id: &str, active: u32, base: u32, goals: u32) -> ClubStatistics {
        ClubStatistics {
            club_id: id.to_string(),
            club_name: format!("Club {id}"),
            division: "A".to_string(),
            area: "A1".to_string(),
            status: "Active".to_string(),
            active_members: active,
            membership_base: base,
            new_members: 0,
            october_renewals: 0,
            april_renewals: 0,
            dcp_goals: goals,
            distinguished_level: DistinguishedLevel::for_club(goals, active, base),
        }
    }

    fn snapshot(clubs: Vec<ClubStatistics>) -> UnitSnapshot {
        UnitSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            unit_id: "42".to_string(),
            snapshot_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            clubs,
            divisions: Vec::new(),
            areas: Vec::new(),
            totals: UnitTotals::default(),
        }
    }

    #[test]
    fn counts_and_projection() {
        let analytics = analyze(&snapshot(vec![
            club("1", 26, 20, 10),
            club("2", 22, 20, 9),
            club("3", 20, 18, 5),
            club("4", 21, 20, 4),
            club("5", 21, 20, 3),
            club("6", 12, 15, 4),
            club("7", 20, 20, 2),
            club("8", 14, 14, 8),
        ]));

        assert_eq!(analytics.counts.smedley, 1);
        assert_eq!(analytics.counts.presidents, 1);
        assert_eq!(analytics.counts.distinguished, 1);
        assert_eq!(analytics.counts.total, 3);
        assert_eq!(analytics.within_reach, vec!["4", "5"]);
        assert_eq!(analytics.projected_total, 5);
        assert!((analytics.distinguished_percentage - 37.5).abs() < f64::EPSILON);
        assert!((analytics.projected_percentage - 62.5).abs() < f64::EPSILON);
    }

    #[test]
    fn projection_is_capped_and_empty_is_zero() {
        let analytics = analyze(&snapshot(vec![club("1", 21, 20, 4)]));
        assert_eq!(analytics.projected_total, 1);

        let empty = analyze(&snapshot(Vec::new()));
        assert_eq!(empty.projected_total, 0);
        assert!(empty.distinguished_percentage.abs() < f64::EPSILON);
    }
}
