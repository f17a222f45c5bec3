//! Club health classification and scoring.

use std::cmp::Ordering;

use chrono::Datelike as _;
use district_stats_analytics_models::{
    ClubHealth, ClubHealthAnalytics, ClubHealthStatus, RiskFactor,
};
use district_stats_snapshot_models::{
    ClubStatistics, MAX_DCP_GOALS, MEMBERSHIP_REQUIREMENT, NET_GROWTH_REQUIREMENT, UnitSnapshot,
};
use district_stats_time_series_models::ClubCounts;

use crate::{mean, round1};

/// Clubs below this many active members are at risk.
pub const LOW_MEMBERSHIP_THRESHOLD: u32 = 12;

/// DCP goals a club is expected to have met by `month` (1-12) of the
/// program year.
#[must_use]
pub const fn dcp_checkpoint(month: u32) -> u32 {
    match month {
        7..=9 => 0,
        10..=12 => 1,
        1..=3 => 3,
        _ => 5,
    }
}

/// Renewal payments are due from October onwards.
const fn renewals_due(month: u32) -> bool {
    !matches!(month, 7..=9)
}

/// Classifies one club as of `month`.
#[must_use]
pub fn classify(club: &ClubStatistics, month: u32) -> ClubHealthStatus {
    if club.active_members < LOW_MEMBERSHIP_THRESHOLD && club.net_growth() < NET_GROWTH_REQUIREMENT
    {
        ClubHealthStatus::InterventionRequired
    } else if club.meets_membership_requirement() && club.dcp_goals >= dcp_checkpoint(month) {
        ClubHealthStatus::Thriving
    } else {
        ClubHealthStatus::Vulnerable
    }
}

/// Risk flags for one club as of `month`.
#[must_use]
pub fn risk_factors(club: &ClubStatistics, month: u32) -> Vec<RiskFactor> {
    let mut factors = Vec::new();

    if club.active_members < LOW_MEMBERSHIP_THRESHOLD {
        factors.push(RiskFactor::LowMembership);
    }
    if club.net_growth() < 0 {
        factors.push(RiskFactor::MembershipDecline);
    }
    if club.dcp_goals < dcp_checkpoint(month) {
        factors.push(RiskFactor::BelowDcpCheckpoint);
    }
    if renewals_due(month) && club.october_renewals + club.april_renewals == 0 {
        factors.push(RiskFactor::NoRenewalPayments);
    }
    if !club.is_active() {
        factors.push(RiskFactor::InactiveStatus);
    }

    factors
}

/// Health score from 0 to 100, rounded to one decimal.
///
/// Membership is worth 40 points (full at the membership requirement),
/// DCP goals 30, net growth 20 (10 when flat), and any payments 10.
#[must_use]
pub fn health_score(club: &ClubStatistics) -> f64 {
    let membership =
        (f64::from(club.active_members) / f64::from(MEMBERSHIP_REQUIREMENT)).min(1.0) * 40.0;
    let goals = f64::from(club.dcp_goals.min(MAX_DCP_GOALS)) / f64::from(MAX_DCP_GOALS) * 30.0;
    let growth = match club.net_growth().cmp(&0) {
        Ordering::Greater => 20.0,
        Ordering::Equal => 10.0,
        Ordering::Less => 0.0,
    };
    let payments = if club.total_payments() > 0 { 10.0 } else { 0.0 };

    round1(membership + goals + growth + payments)
}

/// Evaluates one club.
#[must_use]
pub fn evaluate(club: &ClubStatistics, month: u32) -> ClubHealth {
    ClubHealth {
        club_id: club.club_id.clone(),
        club_name: club.club_name.clone(),
        division: club.division.clone(),
        area: club.area.clone(),
        status: classify(club, month),
        risk_factors: risk_factors(club, month),
        health_score: health_score(club),
        active_members: club.active_members,
        net_growth: club.net_growth(),
        dcp_goals: club.dcp_goals,
    }
}

/// Tallies clubs by health status.
#[must_use]
pub fn count(clubs: &[ClubHealth]) -> ClubCounts {
    let mut counts = ClubCounts::default();
    for club in clubs {
        counts.total += 1;
        match club.status {
            ClubHealthStatus::Thriving => counts.thriving += 1,
            ClubHealthStatus::Vulnerable => counts.vulnerable += 1,
            ClubHealthStatus::InterventionRequired => counts.intervention_required += 1,
        }
    }
    counts
}

/// Evaluates every club in the snapshot, in snapshot order.
#[must_use]
pub fn analyze(snapshot: &UnitSnapshot) -> ClubHealthAnalytics {
    let month = snapshot.snapshot_date.month();
    let clubs: Vec<ClubHealth> = snapshot
        .clubs
        .iter()
        .map(|club| evaluate(club, month))
        .collect();

    ClubHealthAnalytics {
        dcp_checkpoint: dcp_checkpoint(month),
        counts: count(&clubs),
        average_health_score: round1(mean(clubs.iter().map(|c| c.health_score))),
        clubs,
    }
}

#[cfg(test)]
mod tests {
    use district_stats_snapshot_models::DistinguishedLevel;

    use super::*;

    fn club(active: u32, base: u32, goals: u32, oct: u32, apr: u32, new: u32) -> ClubStatistics {
        ClubStatistics {
            club_id: "1".to_string(),
            club_name: "Club".to_string(),
            division: "A".to_string(),
            area: "A1".to_string(),
            status: "Active".to_string(),
            active_members: active,
            membership_base: base,
            new_members: new,
            october_renewals: oct,
            april_renewals: apr,
            dcp_goals: goals,
            distinguished_level: DistinguishedLevel::for_club(goals, active, base),
        }
    }

    #[test]
    fn checkpoints_by_month() {
        assert_eq!(dcp_checkpoint(8), 0);
        assert_eq!(dcp_checkpoint(12), 1);
        assert_eq!(dcp_checkpoint(2), 3);
        assert_eq!(dcp_checkpoint(5), 5);
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify(&club(9, 14, 1, 5, 0, 1), 12),
            ClubHealthStatus::InterventionRequired
        );
        assert_eq!(
            classify(&club(24, 20, 6, 15, 0, 6), 12),
            ClubHealthStatus::Thriving
        );
        // Small but growing clubs are not in intervention.
        assert_eq!(
            classify(&club(11, 8, 6, 5, 0, 3), 12),
            ClubHealthStatus::Thriving
        );
        assert_eq!(
            classify(&club(24, 20, 2, 15, 0, 6), 4),
            ClubHealthStatus::Vulnerable
        );
        assert_eq!(
            classify(&club(15, 15, 9, 15, 0, 6), 12),
            ClubHealthStatus::Vulnerable
        );
    }

    #[test]
    fn scores() {
        assert!((health_score(&club(24, 20, 6, 15, 0, 6)) - 88.0).abs() < f64::EPSILON);
        assert!((health_score(&club(9, 14, 1, 5, 0, 1)) - 31.0).abs() < f64::EPSILON);
        assert!((health_score(&club(20, 20, 10, 0, 0, 0)) - 80.0).abs() < f64::EPSILON);
        assert!((health_score(&club(0, 0, 0, 0, 0, 0)) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_flags() {
        let mut suspended = club(9, 14, 0, 0, 0, 0);
        suspended.status = "Suspended".to_string();

        assert_eq!(
            risk_factors(&suspended, 1),
            vec![
                RiskFactor::LowMembership,
                RiskFactor::MembershipDecline,
                RiskFactor::BelowDcpCheckpoint,
                RiskFactor::NoRenewalPayments,
                RiskFactor::InactiveStatus,
            ]
        );
        assert_eq!(
            risk_factors(&club(9, 14, 0, 0, 0, 0), 8),
            vec![RiskFactor::LowMembership, RiskFactor::MembershipDecline]
        );
        assert!(risk_factors(&club(24, 20, 6, 15, 0, 6), 12).is_empty());
    }
}
