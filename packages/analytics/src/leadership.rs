//! Division and area effectiveness rollups.

use std::collections::BTreeMap;

use district_stats_analytics_models::{
    ClubHealth, ClubHealthStatus, EffectivenessRollup, LeadershipAnalytics,
};
use district_stats_snapshot_models::UnitSnapshot;

use crate::round1;

/// Number of divisions reported as top performers.
const TOP_DIVISIONS: usize = 3;

/// Divisions scoring below this need attention.
const ATTENTION_THRESHOLD: f64 = 50.0;

#[derive(Default)]
struct Accumulator {
    clubs: u32,
    membership: u32,
    net_growth: i64,
    dcp_goals: u32,
    distinguished: u32,
    thriving: u32,
    health_sum: f64,
}

impl Accumulator {
    fn add(&mut self, health: &ClubHealth, distinguished: bool) {
        self.clubs += 1;
        self.membership += health.active_members;
        self.net_growth += health.net_growth;
        self.dcp_goals += health.dcp_goals;
        self.distinguished += u32::from(distinguished);
        self.thriving += u32::from(health.status == ClubHealthStatus::Thriving);
        self.health_sum += health.health_score;
    }

    fn finish(self, division: String, area: Option<String>) -> EffectivenessRollup {
        let clubs = f64::from(self.clubs.max(1));
        let average_health = self.health_sum / clubs;
        let distinguished_ratio = f64::from(self.distinguished) / clubs;

        EffectivenessRollup {
            division,
            area,
            clubs: self.clubs,
            membership: self.membership,
            net_growth: self.net_growth,
            average_dcp_goals: round1(f64::from(self.dcp_goals) / clubs),
            distinguished_clubs: self.distinguished,
            thriving_clubs: self.thriving,
            average_health_score: round1(average_health),
            effectiveness_score: round1(
                0.6f64.mul_add(average_health, 0.4 * distinguished_ratio * 100.0),
            ),
        }
    }
}

/// Rolls club health up to divisions and areas.
///
/// `health` must be in the same order as `snapshot.clubs`.
#[must_use]
pub fn analyze(snapshot: &UnitSnapshot, health: &[ClubHealth]) -> LeadershipAnalytics {
    let mut divisions: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut areas: BTreeMap<(String, String), Accumulator> = BTreeMap::new();

    for (club, club_health) in snapshot.clubs.iter().zip(health) {
        let distinguished = club.distinguished_level.is_distinguished();
        divisions
            .entry(club.division.clone())
            .or_default()
            .add(club_health, distinguished);
        areas
            .entry((club.division.clone(), club.area.clone()))
            .or_default()
            .add(club_health, distinguished);
    }

    let mut divisions: Vec<EffectivenessRollup> = divisions
        .into_iter()
        .map(|(division, acc)| acc.finish(division, None))
        .collect();
    let mut areas: Vec<EffectivenessRollup> = areas
        .into_iter()
        .map(|((division, area), acc)| acc.finish(division, Some(area)))
        .collect();

    sort_by_effectiveness(&mut divisions);
    sort_by_effectiveness(&mut areas);

    let top_divisions = divisions
        .iter()
        .take(TOP_DIVISIONS)
        .map(|d| d.division.clone())
        .collect();
    let needs_attention = divisions
        .iter()
        .filter(|d| d.effectiveness_score < ATTENTION_THRESHOLD)
        .map(|d| d.division.clone())
        .collect();

    LeadershipAnalytics {
        divisions,
        areas,
        top_divisions,
        needs_attention,
    }
}

/// Best first; ties keep alphabetical order.
fn sort_by_effectiveness(rollups: &mut [EffectivenessRollup]) {
    rollups.sort_by(|a, b| {
        b.effectiveness_score
            .total_cmp(&a.effectiveness_score)
            .then_with(|| a.division.cmp(&b.division))
            .then_with(|| a.area.cmp(&b.area))
    });
}
