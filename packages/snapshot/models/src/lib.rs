#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snapshot cache types for the district stats toolchain.
//!
//! A [`UnitSnapshot`] is the immutable, date-keyed statistics record for one
//! collection target ("unit"). Snapshots for one date are accompanied by a
//! [`SnapshotRunMetadata`] and a [`SnapshotManifest`]; the newest fully
//! successful date is recorded in the [`SnapshotPointer`].
//!
//! All types serialize with camelCase keys so the on-disk JSON matches the
//! dashboard cache contract consumed by downstream readers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Schema version stamped on every snapshot artifact.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Minimum active members for a club to meet the membership requirement
/// outright.
pub const MEMBERSHIP_REQUIREMENT: u32 = 20;

/// Net growth that satisfies the membership requirement for smaller clubs.
pub const NET_GROWTH_REQUIREMENT: i64 = 3;

/// Number of DCP goals available in a program year.
pub const MAX_DCP_GOALS: u32 = 10;

/// A timestamped error recorded during a multi-unit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    /// The unit the error belongs to, or `None` for run-level errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// RFC 3339 timestamp of when the error was recorded.
    pub timestamp: String,
}

impl RunError {
    /// Creates an error stamped with the current time.
    #[must_use]
    pub fn new(unit_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.map(str::to_owned),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Collector metadata for one raw collection date
/// (`raw-csv/{date}/metadata.json`).
///
/// `is_closing_period` and `data_month` describe reporting lag: when the
/// dashboard is still publishing the previous month's figures, the data
/// collected on `date` belongs to `data_month`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Collection date (`YYYY-MM-DD`).
    pub date: String,
    /// Whether the dashboard was reporting a prior month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closing_period: Option<bool>,
    /// Month the data actually describes (`YYYY-MM` or `MM`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_month: Option<String>,
    /// When the collector finished writing this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<String>,
    /// Units whose reports were collected (or already cached).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub succeeded_units: Vec<String>,
    /// Units whose collection failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_units: Vec<String>,
    /// Units that were not attempted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_units: Vec<String>,
    /// Raw files present for this date, relative to the date directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub csv_files: Vec<String>,
    /// Errors recorded by the collector.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RunError>,
}

/// Resolved mapping from a requested date to the canonical snapshot date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingPeriodInfo {
    /// Whether the requested date fell in a closing period.
    pub is_closing_period: bool,
    /// Month the data describes (`YYYY-MM`).
    pub data_month: String,
    /// Date the data was requested/collected.
    pub collection_date: String,
    /// Canonical date the snapshot is filed under.
    pub snapshot_date: String,
    /// Always equal to `snapshot_date`.
    pub logical_date: String,
}

/// Distinguished recognition level of a club.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DistinguishedLevel {
    /// Not (yet) distinguished.
    #[default]
    None,
    /// 5+ DCP goals.
    Distinguished,
    /// 7+ DCP goals.
    Select,
    /// 9+ DCP goals.
    Presidents,
    /// 10 DCP goals and 25+ members.
    Smedley,
}

impl DistinguishedLevel {
    /// Computes the level a club has earned.
    ///
    /// Every level requires the membership requirement (20 active members
    /// or net growth of 3); Smedley additionally requires 25 members.
    #[must_use]
    pub const fn for_club(dcp_goals: u32, active_members: u32, membership_base: u32) -> Self {
        if !meets_membership_requirement(active_members, membership_base) {
            return Self::None;
        }
        if dcp_goals >= MAX_DCP_GOALS && active_members >= 25 {
            Self::Smedley
        } else if dcp_goals >= 9 {
            Self::Presidents
        } else if dcp_goals >= 7 {
            Self::Select
        } else if dcp_goals >= 5 {
            Self::Distinguished
        } else {
            Self::None
        }
    }

    /// Returns `true` for any level above [`DistinguishedLevel::None`].
    #[must_use]
    pub const fn is_distinguished(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Returns `true` when a club has 20+ active members or grew by 3+.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn meets_membership_requirement(active_members: u32, membership_base: u32) -> bool {
    active_members >= MEMBERSHIP_REQUIREMENT
        || (active_members as i64 - membership_base as i64) >= NET_GROWTH_REQUIREMENT
}

/// Statistics for one club within a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubStatistics {
    /// Dashboard club number.
    pub club_id: String,
    /// Club display name.
    pub club_name: String,
    /// Division letter/code.
    pub division: String,
    /// Area code within the division.
    pub area: String,
    /// Club status as reported (`Active`, `Suspended`, `Low`, `Ineligible`).
    pub status: String,
    /// Current active (paid) members.
    pub active_members: u32,
    /// Membership at the start of the program year.
    pub membership_base: u32,
    /// New members this program year.
    pub new_members: u32,
    /// October renewal payments.
    pub october_renewals: u32,
    /// April renewal payments.
    pub april_renewals: u32,
    /// DCP goals achieved so far.
    pub dcp_goals: u32,
    /// Distinguished level derived from goals and membership.
    pub distinguished_level: DistinguishedLevel,
}

impl ClubStatistics {
    /// Active members minus membership base.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn net_growth(&self) -> i64 {
        self.active_members as i64 - self.membership_base as i64
    }

    /// New members plus both renewal rounds.
    #[must_use]
    pub const fn total_payments(&self) -> u32 {
        self.new_members + self.october_renewals + self.april_renewals
    }

    /// Whether the club meets the membership requirement.
    #[must_use]
    pub const fn meets_membership_requirement(&self) -> bool {
        meets_membership_requirement(self.active_members, self.membership_base)
    }

    /// Whether the club status is `Active`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Aggregated statistics for a division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionStatistics {
    /// Division code.
    pub division: String,
    /// Number of clubs in the division.
    pub club_count: u32,
    /// Sum of active members.
    pub active_members: u32,
    /// Sum of membership bases.
    pub membership_base: u32,
    /// Sum of DCP goals.
    pub dcp_goals: u32,
    /// Clubs at any distinguished level.
    pub distinguished_clubs: u32,
}

/// Aggregated statistics for an area within a division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStatistics {
    /// Owning division code.
    pub division: String,
    /// Area code.
    pub area: String,
    /// Number of clubs in the area.
    pub club_count: u32,
    /// Sum of active members.
    pub active_members: u32,
    /// Sum of membership bases.
    pub membership_base: u32,
    /// Sum of DCP goals.
    pub dcp_goals: u32,
    /// Clubs at any distinguished level.
    pub distinguished_clubs: u32,
}

/// Unit-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTotals {
    /// Number of clubs.
    pub total_clubs: u32,
    /// Clubs with `Active` status.
    pub paid_clubs: u32,
    /// Sum of active members.
    pub total_membership: u32,
    /// Sum of membership bases.
    pub membership_base: u32,
    /// Sum of payments (new + renewals).
    pub total_payments: u32,
    /// Sum of DCP goals.
    pub total_dcp_goals: u32,
    /// Clubs at any distinguished level.
    pub distinguished_clubs: u32,
}

/// One unit's structured statistics for one canonical date
/// (`snapshots/{date}/unit_{id}.json`).
///
/// There is exactly one on-disk shape; readers deserialize straight into
/// this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    /// Schema version ([`SCHEMA_VERSION`]).
    pub schema_version: String,
    /// Unit identifier.
    pub unit_id: String,
    /// Canonical snapshot date; always equals the containing directory.
    pub snapshot_date: NaiveDate,
    /// Per-club statistics sorted by club ID.
    pub clubs: Vec<ClubStatistics>,
    /// Per-division rollups sorted by division.
    pub divisions: Vec<DivisionStatistics>,
    /// Per-area rollups sorted by division then area.
    pub areas: Vec<AreaStatistics>,
    /// Unit-wide totals.
    pub totals: UnitTotals,
}

/// Outcome of a snapshot run.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotStatus {
    /// Every requested unit succeeded.
    Success,
    /// Some units failed.
    Partial,
    /// No unit succeeded.
    Failed,
}

/// Summary of one transform run (`snapshots/{date}/metadata.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRunMetadata {
    /// Snapshot date (`YYYY-MM-DD`).
    pub snapshot_id: String,
    /// Schema version ([`SCHEMA_VERSION`]).
    pub schema_version: String,
    /// Run outcome.
    pub status: SnapshotStatus,
    /// Units written or already present.
    pub successful_units: Vec<String>,
    /// Units whose build failed.
    pub failed_units: Vec<String>,
    /// Date the data is current as of.
    pub data_as_of_date: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Present (and `true`) only for closing-period runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closing_period_data: Option<bool>,
    /// Collection date, present only for closing-period runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_date: Option<String>,
    /// Logical date, present only for closing-period runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_date: Option<String>,
    /// Errors recorded during the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RunError>,
}

/// Per-unit status in a [`SnapshotManifest`].
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ManifestEntryStatus {
    /// The unit file exists and is valid.
    Success,
    /// The unit's build failed; no file was written.
    Failed,
}

/// One unit entry in a [`SnapshotManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifestEntry {
    /// Unit identifier.
    pub unit_id: String,
    /// File name relative to the snapshot directory.
    pub file_name: String,
    /// Unit status.
    pub status: ManifestEntryStatus,
    /// File size in bytes (0 for failed units).
    pub size: u64,
    /// SHA-256 of the file content, if it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// RFC 3339 modification time, if the file exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Inventory of one snapshot date's unit files
/// (`snapshots/{date}/manifest.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    /// Snapshot date.
    pub snapshot_id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Number of entries.
    pub total_units: usize,
    /// Entries with [`ManifestEntryStatus::Success`].
    pub successful_units: usize,
    /// Entries with [`ManifestEntryStatus::Failed`].
    pub failed_units: usize,
    /// Sum of entry sizes.
    pub total_size: u64,
    /// Per-unit entries sorted by unit ID.
    pub units: Vec<SnapshotManifestEntry>,
}

/// The "latest successful" marker (`snapshots/latest-successful.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPointer {
    /// Snapshot date the pointer refers to.
    pub snapshot_id: String,
    /// RFC 3339 update timestamp.
    pub updated_at: String,
    /// Schema version of the referenced snapshot.
    pub schema_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguished_levels_require_membership() {
        assert_eq!(
            DistinguishedLevel::for_club(10, 15, 15),
            DistinguishedLevel::None
        );
        assert_eq!(
            DistinguishedLevel::for_club(5, 15, 12),
            DistinguishedLevel::Distinguished
        );
        assert_eq!(
            DistinguishedLevel::for_club(7, 20, 20),
            DistinguishedLevel::Select
        );
        assert_eq!(
            DistinguishedLevel::for_club(10, 24, 20),
            DistinguishedLevel::Presidents
        );
        assert_eq!(
            DistinguishedLevel::for_club(10, 25, 20),
            DistinguishedLevel::Smedley
        );
        assert_eq!(
            DistinguishedLevel::for_club(4, 30, 20),
            DistinguishedLevel::None
        );
    }

    #[test]
    fn closing_period_fields_are_omitted_when_absent() {
        let metadata = SnapshotRunMetadata {
            snapshot_id: "2025-01-10".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            status: SnapshotStatus::Success,
            successful_units: vec!["42".to_string()],
            failed_units: Vec::new(),
            data_as_of_date: "2025-01-10".to_string(),
            created_at: "2025-01-10T00:00:00Z".to_string(),
            is_closing_period_data: None,
            collection_date: None,
            logical_date: None,
            errors: Vec::new(),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("isClosingPeriodData"));
        assert!(!obj.contains_key("collectionDate"));
        assert!(!obj.contains_key("logicalDate"));
        assert_eq!(obj["status"], "success");
    }

    #[test]
    fn cache_metadata_tolerates_minimal_shape() {
        let metadata: CacheMetadata =
            serde_json::from_str(r#"{"date":"2025-01-05","isClosingPeriod":true,"dataMonth":"12"}"#)
                .unwrap();
        assert_eq!(metadata.is_closing_period, Some(true));
        assert_eq!(metadata.data_month.as_deref(), Some("12"));
        assert!(metadata.succeeded_units.is_empty());
    }
}
