//! The analytics compute run.

use std::time::Instant;

use district_stats_analytics_models::{
    AnalyticsManifest, AnalyticsType, RankingMetric, UnitAnalyticsSummary,
};
use district_stats_snapshot::closing_period::{detect, parse_date};
use district_stats_snapshot::{is_valid_unit_id, read_cache_metadata, read_unit_snapshot};
use district_stats_snapshot_models::{ClosingPeriodInfo, RunError, UnitSnapshot};
use district_stats_store::{CacheLayout, sha256_hex};
use district_stats_time_series::{ProgramYear, TimeSeriesIndex};
use district_stats_time_series_models::TimeSeriesDataPoint;

use crate::rankings::{RankingTable, load_rankings};
use crate::{
    AnalyticsError, artifact, club_health, distinguished, leadership, trends, year_over_year,
};

/// Options for a compute run.
#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    /// Restrict the run to these units. `None` means every unit with a
    /// snapshot file on the resolved date.
    pub units: Option<Vec<String>>,
    /// Recompute even when the source snapshot checksum is unchanged.
    pub force: bool,
}

/// Outcome of a compute run.
#[derive(Debug, Clone)]
pub struct ComputeResult {
    pub requested_date: String,
    /// Date the analytics were computed for.
    pub snapshot_date: String,
    pub closing_period: ClosingPeriodInfo,
    /// Units whose artifacts were (re)written.
    pub units_computed: Vec<String>,
    /// Units whose source snapshot was unchanged.
    pub units_skipped: Vec<String>,
    pub units_failed: Vec<String>,
    pub errors: Vec<RunError>,
    /// Time-series append failures. These never fail a unit.
    pub time_series_errors: Vec<RunError>,
    /// The manifest, when at least one artifact was written.
    pub manifest: Option<AnalyticsManifest>,
    pub duration_ms: u64,
}

impl ComputeResult {
    /// `true` when no unit failed; skipped units count as success.
    #[must_use]
    pub fn success(&self) -> bool {
        self.units_failed.is_empty()
    }
}

enum UnitOutcome {
    Computed { time_series_error: Option<String> },
    Skipped,
}

/// Computes analytics artifacts from snapshots, gated on snapshot
/// checksums.
#[derive(Debug, Clone)]
pub struct AnalyticsComputeEngine {
    layout: CacheLayout,
    time_series: TimeSeriesIndex,
}

impl AnalyticsComputeEngine {
    #[must_use]
    pub fn new(layout: CacheLayout) -> Self {
        let time_series = TimeSeriesIndex::new(layout.clone());
        Self {
            layout,
            time_series,
        }
    }

    /// Computes analytics for the snapshot that `requested_date` resolves
    /// to.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InvalidDate`] for a malformed date
    /// * [`AnalyticsError::SnapshotNotFound`] when no snapshot exists at
    ///   the resolved date
    /// * [`AnalyticsError`] if the manifest cannot be written
    ///
    /// Per-unit failures are reported in the result.
    pub fn compute(
        &self,
        requested_date: &str,
        options: &ComputeOptions,
    ) -> Result<ComputeResult, AnalyticsError> {
        let started = Instant::now();

        if parse_date(requested_date).is_none() {
            return Err(AnalyticsError::InvalidDate(requested_date.to_owned()));
        }

        let cache_metadata = read_cache_metadata(&self.layout, requested_date);
        let info = detect(requested_date, cache_metadata.as_ref());
        let snapshot_date = info.snapshot_date.clone();

        let available = self.layout.list_snapshot_units(&snapshot_date);
        if available.is_empty() {
            return Err(AnalyticsError::SnapshotNotFound {
                requested: requested_date.to_owned(),
                resolved: snapshot_date,
                closing_period_adjusted: info.is_closing_period,
            });
        }

        let units = match &options.units {
            Some(units) => {
                let mut units = units.clone();
                units.sort();
                units.dedup();
                units
            }
            None => available,
        };

        let rankings = load_rankings(&self.layout, &snapshot_date).map(RankingTable::new);

        log::info!(
            "Computing analytics for {} unit(s) on {snapshot_date}",
            units.len()
        );

        let mut result = ComputeResult {
            requested_date: requested_date.to_owned(),
            snapshot_date: snapshot_date.clone(),
            closing_period: info,
            units_computed: Vec::new(),
            units_skipped: Vec::new(),
            units_failed: Vec::new(),
            errors: Vec::new(),
            time_series_errors: Vec::new(),
            manifest: None,
            duration_ms: 0,
        };

        for unit_id in &units {
            match self.compute_unit(&snapshot_date, unit_id, rankings.as_ref(), options.force) {
                Ok(UnitOutcome::Computed { time_series_error }) => {
                    if let Some(message) = time_series_error {
                        log::warn!("Unit {unit_id}: time-series update failed: {message}");
                        result
                            .time_series_errors
                            .push(RunError::new(Some(unit_id), message));
                    }
                    result.units_computed.push(unit_id.clone());
                }
                Ok(UnitOutcome::Skipped) => {
                    log::debug!("Unit {unit_id}: snapshot unchanged, skipping");
                    result.units_skipped.push(unit_id.clone());
                }
                Err(e) => {
                    log::error!("Unit {unit_id}: {e}");
                    result.units_failed.push(unit_id.clone());
                    result.errors.push(RunError::new(Some(unit_id), e.to_string()));
                }
            }
        }

        if !result.units_computed.is_empty() {
            result.manifest = Some(artifact::write_manifest(&self.layout, &snapshot_date)?);
        }

        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Analytics {snapshot_date}: {} computed, {} skipped, {} failed ({}ms)",
            result.units_computed.len(),
            result.units_skipped.len(),
            result.units_failed.len(),
            result.duration_ms,
        );

        Ok(result)
    }

    fn compute_unit(
        &self,
        snapshot_date: &str,
        unit_id: &str,
        rankings: Option<&RankingTable>,
        force: bool,
    ) -> Result<UnitOutcome, AnalyticsError> {
        if !is_valid_unit_id(unit_id) {
            return Err(AnalyticsError::InvalidUnitId(unit_id.to_owned()));
        }

        let path = self.layout.unit_snapshot_path(snapshot_date, unit_id);
        if !path.is_file() {
            return Err(AnalyticsError::UnitSnapshotMissing {
                unit_id: unit_id.to_owned(),
                snapshot_date: snapshot_date.to_owned(),
            });
        }

        let bytes = std::fs::read(&path)?;
        let source_checksum = sha256_hex(&bytes);

        if !force
            && artifact::stored_source_checksum(
                &self.layout,
                snapshot_date,
                unit_id,
                AnalyticsType::Analytics,
            )
            .as_deref()
                == Some(source_checksum.as_str())
        {
            return Ok(UnitOutcome::Skipped);
        }

        let snapshot: UnitSnapshot = serde_json::from_slice(&bytes)?;
        let prior = self.load_prior_snapshot(&snapshot, unit_id);

        let health = club_health::analyze(&snapshot);
        let point = trends::data_point(&snapshot, health.counts);
        let history = self.program_year_history(&snapshot, unit_id);

        let membership = trends::membership(&snapshot, &history, &point);
        let distinguished = distinguished::analyze(&snapshot);
        let leadership = leadership::analyze(&snapshot, &health.clubs);
        let club_trends = trends::club_trends(
            &snapshot,
            &health.clubs,
            prior.as_ref().map(|(_, s)| s),
        );
        let year_over_year = year_over_year::compare(
            &snapshot,
            prior.as_ref().map(|(date, s)| (date.as_str(), s)),
        );
        let performance = RankingTable::performance(rankings, unit_id);

        let world_rank_payments = performance
            .metrics
            .iter()
            .find(|m| m.metric == RankingMetric::Payments)
            .and_then(|m| m.world_rank);

        let summary = UnitAnalyticsSummary {
            unit_id: unit_id.to_owned(),
            snapshot_date: snapshot_date.to_owned(),
            total_clubs: snapshot.totals.total_clubs,
            paid_clubs: snapshot.totals.paid_clubs,
            total_membership: snapshot.totals.total_membership,
            net_growth: membership.net_growth,
            total_payments: snapshot.totals.total_payments,
            distinguished_clubs: distinguished.counts.total,
            projected_distinguished: distinguished.projected_total,
            club_counts: health.counts,
            average_health_score: health.average_health_score,
            year_over_year_available: year_over_year.available,
            world_rank_payments,
            artifacts: vec![
                AnalyticsType::Membership,
                AnalyticsType::ClubHealth,
                AnalyticsType::Distinguished,
                AnalyticsType::Leadership,
                AnalyticsType::ClubTrends,
                AnalyticsType::YearOverYear,
                AnalyticsType::Performance,
            ],
        };

        let layout = &self.layout;
        let source = source_checksum.as_str();
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::Membership,
            &membership,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::ClubHealth,
            &health,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::Distinguished,
            &distinguished,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::Leadership,
            &leadership,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::ClubTrends,
            &club_trends,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::YearOverYear,
            &year_over_year,
            source,
        )?;
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::Performance,
            &performance,
            source,
        )?;
        // Written last: its source checksum marks the set as complete.
        artifact::write_artifact(
            layout,
            snapshot_date,
            unit_id,
            AnalyticsType::Analytics,
            &summary,
            source,
        )?;

        let time_series_error = self
            .append_time_series(unit_id, point)
            .err()
            .map(|e| e.to_string());

        Ok(UnitOutcome::Computed { time_series_error })
    }

    fn load_prior_snapshot(
        &self,
        snapshot: &UnitSnapshot,
        unit_id: &str,
    ) -> Option<(String, UnitSnapshot)> {
        let Some(date) =
            year_over_year::find_prior_snapshot_date(&self.layout, snapshot.snapshot_date, unit_id)
        else {
            log::warn!(
                "Unit {unit_id}: no prior-year snapshot for {}, year-over-year unavailable",
                snapshot.snapshot_date
            );
            return None;
        };

        match read_unit_snapshot(&self.layout, &date, unit_id) {
            Ok(Some(prior)) => Some((date, prior)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Unit {unit_id}: unreadable prior snapshot {date}: {e}");
                None
            }
        }
    }

    fn program_year_history(
        &self,
        snapshot: &UnitSnapshot,
        unit_id: &str,
    ) -> Vec<TimeSeriesDataPoint> {
        let label = ProgramYear::containing(snapshot.snapshot_date).label();
        match self.time_series.read_program_year(unit_id, &label) {
            Ok(partition) => partition.map(|p| p.data_points).unwrap_or_default(),
            Err(e) => {
                log::warn!("Unit {unit_id}: unreadable time series {label}: {e}");
                Vec::new()
            }
        }
    }

    fn append_time_series(
        &self,
        unit_id: &str,
        point: TimeSeriesDataPoint,
    ) -> Result<(), AnalyticsError> {
        self.time_series.write_data_point(unit_id, point)?;
        self.time_series.update_metadata(unit_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use district_stats_analytics_models::{
        AnalyticsArtifact, ClubHealthAnalytics, PerformanceAnalytics, RankingsFile,
        UnitRankingInput, YearOverYearAnalytics,
    };
    use district_stats_snapshot::builder::assemble_snapshot;
    use district_stats_snapshot_models::{CacheMetadata, ClubStatistics, DistinguishedLevel};
    use district_stats_store::write_json_atomic;

    use super::*;

    fn setup(name: &str) -> CacheLayout {
        let root = std::env::temp_dir().join(format!("district_stats_engine_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        CacheLayout::new(root)
    }

    fn teardown(layout: &CacheLayout) {
        let _ = std::fs::remove_dir_all(layout.root());
    }

    fn club(id: &str, division: &str, active: u32, base: u32, goals: u32) -> ClubStatistics {
        ClubStatistics {
            club_id: id.to_string(),
            club_name: format!("Club {id}"),
            division: division.to_string(),
            area: format!("{division}1"),
            status: "Active".to_string(),
            active_members: active,
            membership_base: base,
            new_members: 2,
            october_renewals: 10,
            april_renewals: 0,
            dcp_goals: goals,
            distinguished_level: DistinguishedLevel::for_club(goals, active, base),
        }
    }

    fn write_snapshot(layout: &CacheLayout, date: &str, unit_id: &str, members: u32) {
        let snapshot_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let snapshot = assemble_snapshot(
            unit_id,
            snapshot_date,
            vec![
                club("1001", "A", members, 20, 6),
                club("1002", "A", 9, 14, 1),
                club("2001", "B", 21, 20, 4),
            ],
        );
        write_json_atomic(&layout.unit_snapshot_path(date, unit_id), &snapshot).unwrap();
    }

    fn read<T: serde::de::DeserializeOwned>(
        layout: &CacheLayout,
        date: &str,
        unit_id: &str,
        kind: AnalyticsType,
    ) -> AnalyticsArtifact<T> {
        artifact::read_artifact(layout, date, unit_id, kind)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn computes_every_artifact_with_source_checksum() {
        let layout = setup("all_artifacts");
        write_snapshot(&layout, "2025-01-31", "42", 24);

        let result = AnalyticsComputeEngine::new(layout.clone())
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();
        assert!(result.success());
        assert_eq!(result.units_computed, vec!["42"]);

        let source = district_stats_store::file_sha256(
            &layout.unit_snapshot_path("2025-01-31", "42"),
        )
        .unwrap();
        for kind in [
            AnalyticsType::Membership,
            AnalyticsType::ClubHealth,
            AnalyticsType::Distinguished,
            AnalyticsType::Leadership,
            AnalyticsType::ClubTrends,
            AnalyticsType::YearOverYear,
            AnalyticsType::Performance,
            AnalyticsType::Analytics,
        ] {
            let artifact: AnalyticsArtifact<serde_json::Value> =
                read(&layout, "2025-01-31", "42", kind);
            assert_eq!(
                artifact.metadata.source_snapshot_checksum.as_deref(),
                Some(source.as_str())
            );
            assert_eq!(
                artifact.metadata.checksum,
                artifact::data_checksum(&artifact.data).unwrap()
            );
            assert_eq!(artifact.metadata.snapshot_date, "2025-01-31");
        }

        let health: AnalyticsArtifact<ClubHealthAnalytics> =
            read(&layout, "2025-01-31", "42", AnalyticsType::ClubHealth);
        assert_eq!(health.data.counts.total, 3);
        assert_eq!(health.data.counts.intervention_required, 1);

        let yoy: AnalyticsArtifact<YearOverYearAnalytics> =
            read(&layout, "2025-01-31", "42", AnalyticsType::YearOverYear);
        assert!(!yoy.data.available);

        let performance: AnalyticsArtifact<PerformanceAnalytics> =
            read(&layout, "2025-01-31", "42", AnalyticsType::Performance);
        assert!(!performance.data.rankings_available);
        assert!(performance.data.metrics.iter().all(|m| m.world_rank.is_none()));

        let manifest = result.manifest.unwrap();
        assert_eq!(manifest.total_files, 8);
        assert_eq!(
            manifest.total_size,
            manifest.files.iter().map(|f| f.size).sum::<u64>()
        );

        let series = TimeSeriesIndex::new(layout.clone())
            .read_program_year("42", "2024-2025")
            .unwrap()
            .unwrap();
        assert_eq!(series.data_points.len(), 1);
        assert_eq!(series.data_points[0].date, "2025-01-31");
        assert!(layout.time_series_metadata_path("42").is_file());

        teardown(&layout);
    }

    #[test]
    fn unchanged_snapshots_are_skipped() {
        let layout = setup("checksum_gate");
        write_snapshot(&layout, "2025-01-31", "42", 24);
        write_snapshot(&layout, "2025-01-31", "7", 22);

        let engine = AnalyticsComputeEngine::new(layout.clone());
        engine
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();

        let untouched = layout.analytics_artifact_path("2025-01-31", "42", "membership");
        let before = std::fs::read(&untouched).unwrap();

        let second = engine
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();
        assert!(second.success());
        assert!(second.units_computed.is_empty());
        assert_eq!(second.units_skipped, vec!["42", "7"]);
        assert!(second.manifest.is_none());

        // One extra byte in unit 7's snapshot.
        let path = layout.unit_snapshot_path("2025-01-31", "7");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.push(b'\n');
        std::fs::write(&path, bytes).unwrap();

        let third = engine
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();
        assert_eq!(third.units_computed, vec!["7"]);
        assert_eq!(third.units_skipped, vec!["42"]);
        assert_eq!(std::fs::read(&untouched).unwrap(), before);

        let forced = engine
            .compute(
                "2025-01-31",
                &ComputeOptions {
                    units: Some(vec!["42".to_string()]),
                    force: true,
                },
            )
            .unwrap();
        assert_eq!(forced.units_computed, vec!["42"]);

        teardown(&layout);
    }

    #[test]
    fn missing_snapshot_reports_closing_adjustment() {
        let layout = setup("not_found");
        let metadata = CacheMetadata {
            date: "2025-01-05".to_string(),
            is_closing_period: Some(true),
            data_month: Some("2024-12".to_string()),
            ..CacheMetadata::default()
        };
        write_json_atomic(&layout.raw_metadata_path("2025-01-05"), &metadata).unwrap();

        let engine = AnalyticsComputeEngine::new(layout.clone());
        match engine.compute("2025-01-05", &ComputeOptions::default()) {
            Err(AnalyticsError::SnapshotNotFound {
                resolved,
                closing_period_adjusted,
                ..
            }) => {
                assert_eq!(resolved, "2024-12-31");
                assert!(closing_period_adjusted);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        match engine.compute("2025-02-10", &ComputeOptions::default()) {
            Err(AnalyticsError::SnapshotNotFound {
                closing_period_adjusted,
                ..
            }) => assert!(!closing_period_adjusted),
            other => panic!("unexpected result: {other:?}"),
        }

        write_snapshot(&layout, "2024-12-31", "42", 24);
        let result = engine
            .compute("2025-01-05", &ComputeOptions::default())
            .unwrap();
        assert_eq!(result.snapshot_date, "2024-12-31");
        assert_eq!(result.units_computed, vec!["42"]);

        teardown(&layout);
    }

    #[test]
    fn time_series_failure_does_not_fail_unit() {
        let layout = setup("time_series_failure");
        write_snapshot(&layout, "2025-01-31", "42", 24);
        write_snapshot(&layout, "2025-01-31", "7", 22);

        // A regular file where unit 42's partition directory belongs.
        let blocked = layout.time_series_unit_dir("42");
        std::fs::create_dir_all(blocked.parent().unwrap()).unwrap();
        std::fs::write(&blocked, b"not a directory").unwrap();

        let result = AnalyticsComputeEngine::new(layout.clone())
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();

        assert!(result.success());
        assert_eq!(result.units_computed, vec!["42", "7"]);
        assert!(result.units_failed.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(result.time_series_errors.len(), 1);
        assert_eq!(result.time_series_errors[0].unit_id.as_deref(), Some("42"));

        assert!(
            layout
                .analytics_artifact_path("2025-01-31", "42", "analytics")
                .is_file()
        );
        assert!(layout.time_series_metadata_path("7").is_file());

        teardown(&layout);
    }

    #[test]
    fn unit_failures_are_isolated() {
        let layout = setup("isolation");
        write_snapshot(&layout, "2025-01-31", "42", 24);
        let corrupt = layout.unit_snapshot_path("2025-01-31", "7");
        std::fs::write(&corrupt, "{not json").unwrap();

        let result = AnalyticsComputeEngine::new(layout.clone())
            .compute(
                "2025-01-31",
                &ComputeOptions {
                    units: Some(vec!["7".to_string(), "42".to_string(), "99".to_string()]),
                    force: false,
                },
            )
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.units_computed, vec!["42"]);
        assert_eq!(result.units_failed, vec!["7", "99"]);
        assert_eq!(result.errors.len(), 2);

        teardown(&layout);
    }

    #[test]
    fn uses_prior_year_and_rankings() {
        let layout = setup("yoy_rankings");
        write_snapshot(&layout, "2024-01-31", "42", 20);
        write_snapshot(&layout, "2025-01-31", "42", 24);
        let rankings = RankingsFile {
            generated_at: None,
            source_date: None,
            rankings: ["1", "42", "3", "4", "5"]
                .iter()
                .zip([500, 400, 300, 200, 100])
                .map(|(id, paid)| UnitRankingInput {
                    unit_id: (*id).to_string(),
                    region: "01".to_string(),
                    paid_clubs: paid,
                    total_payments: paid * 10,
                    distinguished_clubs: 1,
                })
                .collect(),
        };
        write_json_atomic(&layout.rankings_path("2025-01-31"), &rankings).unwrap();

        AnalyticsComputeEngine::new(layout.clone())
            .compute("2025-01-31", &ComputeOptions::default())
            .unwrap();

        let yoy: AnalyticsArtifact<YearOverYearAnalytics> =
            read(&layout, "2025-01-31", "42", AnalyticsType::YearOverYear);
        assert!(yoy.data.available);
        assert_eq!(yoy.data.previous_snapshot_date.as_deref(), Some("2024-01-31"));
        assert_eq!(yoy.data.metrics.unwrap().membership.change, 4);

        let performance: AnalyticsArtifact<PerformanceAnalytics> =
            read(&layout, "2025-01-31", "42", AnalyticsType::Performance);
        let clubs = &performance.data.metrics[0];
        assert_eq!(clubs.world_rank, Some(2));
        assert_eq!(clubs.world_percentile, Some(60.0));
        assert_eq!(performance.data.region.as_deref(), Some("01"));

        let summary: AnalyticsArtifact<UnitAnalyticsSummary> =
            read(&layout, "2025-01-31", "42", AnalyticsType::Analytics);
        assert_eq!(summary.data.world_rank_payments, Some(2));
        assert!(summary.data.year_over_year_available);

        teardown(&layout);
    }
}
