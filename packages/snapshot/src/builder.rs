//! Building [`UnitSnapshot`]s from raw collector output.
//!
//! The [`StatisticsBuilder`] trait is the seam between raw tabular reports
//! and structured snapshot content. [`CsvStatisticsBuilder`] reads the
//! dashboard's club performance export using its fixed column names.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use district_stats_snapshot_models::{
    AreaStatistics, ClubStatistics, DistinguishedLevel, DivisionStatistics, SCHEMA_VERSION,
    UnitSnapshot, UnitTotals,
};

use crate::SnapshotError;

/// File name of the club performance report inside a raw unit directory.
pub const CLUB_PERFORMANCE_FILE: &str = "club-performance.csv";

const COL_CLUB_NUMBER: &str = "Club Number";
const COL_CLUB_NAME: &str = "Club Name";
const COL_DIVISION: &str = "Division";
const COL_AREA: &str = "Area";
const COL_ACTIVE_MEMBERS: &str = "Active Members";
const COL_MEMBERSHIP_BASE: &str = "Mem. Base";
const COL_GOALS_MET: &str = "Goals Met";
const COL_CLUB_STATUS: &str = "Club Status";
const COL_OCT_RENEWALS: &str = "Oct. Ren.";
const COL_APR_RENEWALS: &str = "Apr. Ren.";
const COL_NEW_MEMBERS: &str = "New Members";

/// Turns one unit's raw reports into structured snapshot content.
pub trait StatisticsBuilder: Send + Sync {
    /// Builds the snapshot for `unit_id`, filed under `snapshot_date`,
    /// from the reports in `raw_unit_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the raw input is missing or malformed.
    fn build(
        &self,
        raw_unit_dir: &Path,
        unit_id: &str,
        snapshot_date: NaiveDate,
    ) -> Result<UnitSnapshot, SnapshotError>;
}

/// Builds snapshots from `club-performance.csv`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStatisticsBuilder;

impl StatisticsBuilder for CsvStatisticsBuilder {
    fn build(
        &self,
        raw_unit_dir: &Path,
        unit_id: &str,
        snapshot_date: NaiveDate,
    ) -> Result<UnitSnapshot, SnapshotError> {
        let path = raw_unit_dir.join(CLUB_PERFORMANCE_FILE);
        if !path.is_file() {
            return Err(SnapshotError::MissingRawInput {
                unit_id: unit_id.to_owned(),
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read(&path)?;
        let clubs = parse_club_performance(&contents)?;
        log::debug!(
            "Unit {unit_id}: parsed {} clubs from {}",
            clubs.len(),
            path.display()
        );

        Ok(assemble_snapshot(unit_id, snapshot_date, clubs))
    }
}

/// Parses a club performance CSV export into club records.
///
/// Empty numeric cells count as zero; rows without a club number are
/// ignored (the export ends with a totals row).
///
/// # Errors
///
/// Returns [`SnapshotError::Csv`] if the CSV is malformed, or
/// [`SnapshotError::Parse`] if the header row lacks a club number column.
pub fn parse_club_performance(contents: &[u8]) -> Result<Vec<ClubStatistics>, SnapshotError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if !headers.iter().any(|h| h == COL_CLUB_NUMBER) {
        return Err(SnapshotError::Parse(format!(
            "club performance report has no '{COL_CLUB_NUMBER}' column"
        )));
    }

    let mut clubs = Vec::new();

    for result in reader.records() {
        let record = result?;
        let row: BTreeMap<&str, &str> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), record.get(i).unwrap_or("").trim()))
            .collect();

        let club_id = text(&row, COL_CLUB_NUMBER);
        if club_id.is_empty() {
            continue;
        }

        let active_members = number(&row, COL_ACTIVE_MEMBERS);
        let membership_base = number(&row, COL_MEMBERSHIP_BASE);
        let dcp_goals = number(&row, COL_GOALS_MET);

        clubs.push(ClubStatistics {
            club_id,
            club_name: text(&row, COL_CLUB_NAME),
            division: text(&row, COL_DIVISION),
            area: text(&row, COL_AREA),
            status: text(&row, COL_CLUB_STATUS),
            active_members,
            membership_base,
            new_members: number(&row, COL_NEW_MEMBERS),
            october_renewals: number(&row, COL_OCT_RENEWALS),
            april_renewals: number(&row, COL_APR_RENEWALS),
            dcp_goals,
            distinguished_level: DistinguishedLevel::for_club(
                dcp_goals,
                active_members,
                membership_base,
            ),
        });
    }

    Ok(clubs)
}

fn text(row: &BTreeMap<&str, &str>, column: &str) -> String {
    row.get(column).copied().unwrap_or("").to_owned()
}

fn number(row: &BTreeMap<&str, &str>, column: &str) -> u32 {
    row.get(column)
        .and_then(|v| v.replace(',', "").parse::<u32>().ok())
        .unwrap_or(0)
}

/// Assembles a snapshot from club records, computing division, area, and
/// unit totals. Clubs are sorted by ID so the output is deterministic.
#[must_use]
pub fn assemble_snapshot(
    unit_id: &str,
    snapshot_date: NaiveDate,
    mut clubs: Vec<ClubStatistics>,
) -> UnitSnapshot {
    clubs.sort_by(|a, b| a.club_id.cmp(&b.club_id));

    let mut divisions: BTreeMap<&str, DivisionStatistics> = BTreeMap::new();
    let mut areas: BTreeMap<(&str, &str), AreaStatistics> = BTreeMap::new();
    let mut totals = UnitTotals::default();

    for club in &clubs {
        let distinguished = u32::from(club.distinguished_level.is_distinguished());

        let division = divisions
            .entry(club.division.as_str())
            .or_insert_with(|| DivisionStatistics {
                division: club.division.clone(),
                club_count: 0,
                active_members: 0,
                membership_base: 0,
                dcp_goals: 0,
                distinguished_clubs: 0,
            });
        division.club_count += 1;
        division.active_members += club.active_members;
        division.membership_base += club.membership_base;
        division.dcp_goals += club.dcp_goals;
        division.distinguished_clubs += distinguished;

        let area = areas
            .entry((club.division.as_str(), club.area.as_str()))
            .or_insert_with(|| AreaStatistics {
                division: club.division.clone(),
                area: club.area.clone(),
                club_count: 0,
                active_members: 0,
                membership_base: 0,
                dcp_goals: 0,
                distinguished_clubs: 0,
            });
        area.club_count += 1;
        area.active_members += club.active_members;
        area.membership_base += club.membership_base;
        area.dcp_goals += club.dcp_goals;
        area.distinguished_clubs += distinguished;

        totals.total_clubs += 1;
        totals.paid_clubs += u32::from(club.is_active());
        totals.total_membership += club.active_members;
        totals.membership_base += club.membership_base;
        totals.total_payments += club.total_payments();
        totals.total_dcp_goals += club.dcp_goals;
        totals.distinguished_clubs += distinguished;
    }

    let divisions = divisions.into_values().collect();
    let areas = areas.into_values().collect();

    UnitSnapshot {
        schema_version: SCHEMA_VERSION.to_owned(),
        unit_id: unit_id.to_owned(),
        snapshot_date,
        clubs,
        divisions,
        areas,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Club Number,Club Name,Division,Area,Active Members,Mem. Base,Goals Met,Club Status,Oct. Ren.,Apr. Ren.,New Members
2002,Beta Speakers,A,A2,9,14,1,Active,5,,1
1001,Alpha Talkers,A,A1,24,20,6,Active,15,0,6
3003,Gamma Club,B,B1,13,10,2,Suspended,,,
,Totals,,,46,44,9,,20,0,7
";

    #[test]
    fn parses_rows_and_skips_totals() {
        let clubs = parse_club_performance(CSV.as_bytes()).unwrap();
        assert_eq!(clubs.len(), 3);
        let beta = &clubs[0];
        assert_eq!(beta.club_id, "2002");
        assert_eq!(beta.april_renewals, 0);
        assert_eq!(beta.total_payments(), 6);
        assert_eq!(clubs[1].distinguished_level, DistinguishedLevel::Distinguished);
        assert_eq!(clubs[2].new_members, 0);
    }

    #[test]
    fn assembles_sorted_rollups() {
        let clubs = parse_club_performance(CSV.as_bytes()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let snapshot = assemble_snapshot("42", date, clubs);

        let ids: Vec<&str> = snapshot.clubs.iter().map(|c| c.club_id.as_str()).collect();
        assert_eq!(ids, vec!["1001", "2002", "3003"]);

        assert_eq!(snapshot.divisions.len(), 2);
        assert_eq!(snapshot.divisions[0].division, "A");
        assert_eq!(snapshot.divisions[0].club_count, 2);
        assert_eq!(snapshot.divisions[0].active_members, 33);
        assert_eq!(snapshot.areas.len(), 3);

        assert_eq!(snapshot.totals.total_clubs, 3);
        assert_eq!(snapshot.totals.paid_clubs, 2);
        assert_eq!(snapshot.totals.total_membership, 46);
        assert_eq!(snapshot.totals.total_payments, 27);
        assert_eq!(snapshot.totals.distinguished_clubs, 1);
    }

    #[test]
    fn missing_club_number_column_is_rejected() {
        let result = parse_club_performance(b"Name,Members\nx,1\n");
        assert!(matches!(result, Err(SnapshotError::Parse(_))));
    }

    #[test]
    fn missing_report_is_a_unit_failure() {
        let dir = std::env::temp_dir().join("district_stats_builder_missing");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let result = CsvStatisticsBuilder.build(&dir, "42", date);
        assert!(matches!(result, Err(SnapshotError::MissingRawInput { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
