#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analytics artifact types.
//!
//! Every analytics file is an [`AnalyticsArtifact`] envelope around one
//! payload type. The envelope records the checksum of its payload and of
//! the snapshot file it was derived from, which gates recomputation.

use std::collections::BTreeMap;

use district_stats_snapshot_models::DistinguishedLevel;
use district_stats_time_series_models::ClubCounts;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Message reported when no prior-year snapshot is available.
pub const INSUFFICIENT_HISTORY: &str = "insufficient historical data";

// ── Envelope and manifest ────────────────────────────────────────────

/// The kinds of analytics artifacts written per unit.
///
/// The string form is the artifact file suffix
/// (`unit_{id}_{type}.json`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AnalyticsType {
    Membership,
    ClubHealth,
    Distinguished,
    Leadership,
    ClubTrends,
    YearOverYear,
    Performance,
    /// Per-unit summary, written last. Its source checksum gates
    /// recomputation of the whole set.
    Analytics,
}

/// Envelope metadata shared by every artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub schema_version: String,
    /// RFC 3339 UTC.
    pub computed_at: String,
    pub snapshot_date: String,
    pub unit_id: String,
    /// SHA-256 of the compact JSON serialization of `data`.
    pub checksum: String,
    /// SHA-256 of the snapshot file the artifact was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_snapshot_checksum: Option<String>,
}

/// One analytics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsArtifact<T> {
    pub metadata: ArtifactMetadata,
    pub data: T,
}

/// One file in an [`AnalyticsManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsManifestEntry {
    pub filename: String,
    pub unit_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    /// SHA-256 of the file content.
    pub checksum: String,
}

/// Inventory of a snapshot date's analytics directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsManifest {
    pub snapshot_date: String,
    pub generated_at: String,
    pub schema_version: String,
    pub files: Vec<AnalyticsManifestEntry>,
    pub total_files: usize,
    pub total_size: u64,
}

impl AnalyticsManifest {
    /// Builds a manifest whose totals are derived from `files`.
    #[must_use]
    pub fn new(
        snapshot_date: impl Into<String>,
        generated_at: impl Into<String>,
        schema_version: impl Into<String>,
        files: Vec<AnalyticsManifestEntry>,
    ) -> Self {
        Self {
            snapshot_date: snapshot_date.into(),
            generated_at: generated_at.into(),
            schema_version: schema_version.into(),
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            files,
        }
    }
}

// ── Cross-unit rankings input ────────────────────────────────────────

/// One unit's row in the cross-unit rankings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRankingInput {
    pub unit_id: String,
    #[serde(default)]
    pub region: String,
    pub paid_clubs: u32,
    pub total_payments: u32,
    pub distinguished_clubs: u32,
}

/// `snapshots/{date}/all-districts-rankings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_date: Option<String>,
    pub rankings: Vec<UnitRankingInput>,
}

// ── Membership ───────────────────────────────────────────────────────

/// One point of the membership/payments trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipAnalytics {
    pub program_year: String,
    pub total_membership: u32,
    pub membership_base: u32,
    pub net_growth: i64,
    pub new_members: u32,
    pub total_payments: u32,
    /// Change since the first point of the program year.
    pub program_year_change: i64,
    pub membership_trend: Vec<TrendPoint>,
    pub payments_trend: Vec<TrendPoint>,
}

// ── Club health ──────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClubHealthStatus {
    Thriving,
    Vulnerable,
    InterventionRequired,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RiskFactor {
    /// Fewer than 12 active members.
    LowMembership,
    /// Fewer active members than the membership base.
    MembershipDecline,
    /// Fewer DCP goals than expected for the month.
    BelowDcpCheckpoint,
    /// No October or April renewals once renewals are due.
    NoRenewalPayments,
    /// Club status other than Active.
    InactiveStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubHealth {
    pub club_id: String,
    pub club_name: String,
    pub division: String,
    pub area: String,
    pub status: ClubHealthStatus,
    pub risk_factors: Vec<RiskFactor>,
    /// 0-100, one decimal.
    pub health_score: f64,
    pub active_members: u32,
    pub net_growth: i64,
    pub dcp_goals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubHealthAnalytics {
    /// Goals a club is expected to have reached by the snapshot month.
    pub dcp_checkpoint: u32,
    pub counts: ClubCounts,
    pub average_health_score: f64,
    pub clubs: Vec<ClubHealth>,
}

// ── Distinguished ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedCounts {
    pub smedley: u32,
    pub presidents: u32,
    pub select: u32,
    pub distinguished: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedAnalytics {
    pub total_clubs: u32,
    pub counts: DistinguishedCounts,
    pub distinguished_percentage: f64,
    /// Clubs within two goals of Distinguished that meet the membership
    /// requirement.
    pub within_reach: Vec<String>,
    pub projected_total: u32,
    pub projected_percentage: f64,
}

// ── Leadership ───────────────────────────────────────────────────────

/// Effectiveness rollup for one division or area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessRollup {
    pub division: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub clubs: u32,
    pub membership: u32,
    pub net_growth: i64,
    pub average_dcp_goals: f64,
    pub distinguished_clubs: u32,
    pub thriving_clubs: u32,
    pub average_health_score: f64,
    pub effectiveness_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadershipAnalytics {
    /// Sorted by effectiveness, best first.
    pub divisions: Vec<EffectivenessRollup>,
    /// Sorted by effectiveness, best first.
    pub areas: Vec<EffectivenessRollup>,
    pub top_divisions: Vec<String>,
    pub needs_attention: Vec<String>,
}

// ── Club trends ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubTrend {
    pub club_name: String,
    pub division: String,
    pub area: String,
    pub active_members: u32,
    pub net_growth: i64,
    pub dcp_goals: u32,
    pub distinguished_level: DistinguishedLevel,
    pub health_status: ClubHealthStatus,
    pub health_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_year_members: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_change: Option<i64>,
}

/// Club trends keyed by club ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubTrendsAnalytics {
    pub clubs: BTreeMap<String, ClubTrend>,
}

// ── Year over year ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricChange {
    pub current: u32,
    pub previous: u32,
    pub change: i64,
    /// One decimal; `None` when `previous` is zero.
    pub percentage_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverYearMetrics {
    pub membership: MetricChange,
    pub payments: MetricChange,
    pub clubs: MetricChange,
    pub distinguished_clubs: MetricChange,
    pub dcp_goals: MetricChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverYearAnalytics {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_snapshot_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<YearOverYearMetrics>,
}

impl YearOverYearAnalytics {
    /// The result when no prior-year snapshot exists.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            message: Some(INSUFFICIENT_HISTORY.to_owned()),
            previous_snapshot_date: None,
            metrics: None,
        }
    }
}

// ── Performance (rankings) ───────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RankingMetric {
    /// Paid clubs.
    Clubs,
    Payments,
    Distinguished,
}

/// Rank and percentile of one metric. Every field is `None` when the
/// unit is absent from the rankings or no rankings were available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRanking {
    pub metric: RankingMetric,
    pub value: Option<u32>,
    pub world_rank: Option<usize>,
    pub world_total: Option<usize>,
    pub world_percentile: Option<f64>,
    pub region_rank: Option<usize>,
    pub region_total: Option<usize>,
    pub region_percentile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalytics {
    pub rankings_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub metrics: Vec<MetricRanking>,
}

// ── Summary ──────────────────────────────────────────────────────────

/// Per-unit summary artifact (`unit_{id}_analytics.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAnalyticsSummary {
    pub unit_id: String,
    pub snapshot_date: String,
    pub total_clubs: u32,
    pub paid_clubs: u32,
    pub total_membership: u32,
    pub net_growth: i64,
    pub total_payments: u32,
    pub distinguished_clubs: u32,
    pub projected_distinguished: u32,
    pub club_counts: ClubCounts,
    pub average_health_score: f64,
    pub year_over_year_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_rank_payments: Option<usize>,
    /// Artifact types written alongside this summary.
    pub artifacts: Vec<AnalyticsType>,
}
