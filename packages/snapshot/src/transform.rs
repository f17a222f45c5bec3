//! Raw-to-snapshot transform.
//!
//! One run resolves the canonical snapshot date for the requested
//! collection date, builds every unit independently (a unit failure never
//! aborts the others), writes each unit file atomically, and then records
//! run metadata, a manifest, and (for fully successful runs) the
//! "latest successful" pointer.

use std::time::Instant;

use chrono::{DateTime, Utc};
use district_stats_snapshot_models::{
    ClosingPeriodInfo, ManifestEntryStatus, RunError, SCHEMA_VERSION, SnapshotManifest,
    SnapshotManifestEntry, SnapshotRunMetadata, SnapshotStatus,
};
use district_stats_store::{CacheLayout, file_sha256, write_json_atomic};

use crate::builder::StatisticsBuilder;
use crate::closing_period::{detect, parse_date};
use crate::{SnapshotError, is_valid_unit_id, pointer, read_cache_metadata, read_run_metadata};

/// Options for a transform run.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Restrict the run to these units. `None` means every raw unit
    /// directory for the date.
    pub units: Option<Vec<String>>,
    /// Rebuild existing unit files, ignore the newer-data check, and allow
    /// the pointer to move backwards.
    pub force: bool,
}

/// Outcome of a transform run.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Collection date the run was asked to process.
    pub requested_date: String,
    /// Date the snapshot was (or would have been) filed under.
    pub snapshot_date: String,
    /// Closing-period resolution for the run.
    pub closing_period: ClosingPeriodInfo,
    /// Units whose snapshot was written by this run.
    pub units_succeeded: Vec<String>,
    /// Units whose build or write failed.
    pub units_failed: Vec<String>,
    /// Units whose snapshot already existed.
    pub units_skipped: Vec<String>,
    /// Per-unit errors.
    pub errors: Vec<RunError>,
    /// The whole run was skipped because the existing snapshot holds
    /// newer closing-period data.
    pub skipped_run: bool,
    /// Whether the "latest successful" pointer was written.
    pub pointer_updated: bool,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl TransformResult {
    /// `true` when no unit failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.units_failed.is_empty()
    }

    fn new(requested_date: &str, closing_period: ClosingPeriodInfo) -> Self {
        Self {
            requested_date: requested_date.to_owned(),
            snapshot_date: closing_period.snapshot_date.clone(),
            closing_period,
            units_succeeded: Vec::new(),
            units_failed: Vec::new(),
            units_skipped: Vec::new(),
            errors: Vec::new(),
            skipped_run: false,
            pointer_updated: false,
            duration_ms: 0,
        }
    }
}

/// Builds versioned snapshots from raw collector output.
pub struct TransformService<B: StatisticsBuilder> {
    layout: CacheLayout,
    builder: B,
}

impl<B: StatisticsBuilder> TransformService<B> {
    /// Creates a service writing into `layout`.
    pub const fn new(layout: CacheLayout, builder: B) -> Self {
        Self { layout, builder }
    }

    /// Returns the cache layout.
    pub const fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Transforms the raw data collected on `requested_date`.
    ///
    /// # Errors
    ///
    /// * [`SnapshotError::InvalidDate`] if `requested_date` is not a valid
    ///   `YYYY-MM-DD` date
    /// * [`SnapshotError::NoRawData`] if no raw input exists for any unit
    /// * [`SnapshotError::Store`] if run metadata, manifest, or pointer
    ///   cannot be written
    ///
    /// Per-unit failures are reported in the result, not as errors.
    pub fn transform(
        &self,
        requested_date: &str,
        options: &TransformOptions,
    ) -> Result<TransformResult, SnapshotError> {
        let started = Instant::now();

        if parse_date(requested_date).is_none() {
            return Err(SnapshotError::InvalidDate(requested_date.to_owned()));
        }

        let cache_metadata = read_cache_metadata(&self.layout, requested_date);
        let info = detect(requested_date, cache_metadata.as_ref());
        let snapshot_date = info.snapshot_date.clone();
        let mut result = TransformResult::new(requested_date, info.clone());

        let supersedes = if info.is_closing_period && !options.force {
            if !self.should_update_snapshot(&snapshot_date, &info.collection_date) {
                log::info!(
                    "Snapshot {snapshot_date} already holds data at least as new as \
                     {requested_date}, skipping"
                );
                result.skipped_run = true;
                result.duration_ms = elapsed_ms(started);
                return Ok(result);
            }
            self.layout.snapshot_metadata_path(&snapshot_date).is_file()
        } else {
            false
        };
        if supersedes {
            log::info!(
                "Closing-period data collected {requested_date} replaces snapshot {snapshot_date}"
            );
        }
        let overwrite = options.force || supersedes;

        let units = self.resolve_units(requested_date, options)?;
        log::info!(
            "Transforming {} unit(s) collected {requested_date} into snapshot {snapshot_date}",
            units.len()
        );

        for unit_id in &units {
            match self.transform_unit(requested_date, &snapshot_date, unit_id, overwrite) {
                Ok(true) => result.units_succeeded.push(unit_id.clone()),
                Ok(false) => {
                    log::debug!("Unit {unit_id}: snapshot exists, skipping");
                    result.units_skipped.push(unit_id.clone());
                }
                Err(e) => {
                    log::error!("Unit {unit_id}: {e}");
                    result.units_failed.push(unit_id.clone());
                    result.errors.push(RunError::new(Some(unit_id), e.to_string()));
                }
            }
        }

        let nothing_written = result.units_succeeded.is_empty() && result.units_failed.is_empty();
        let metadata_exists = self.layout.snapshot_metadata_path(&snapshot_date).is_file();

        if nothing_written && metadata_exists {
            log::info!("Snapshot {snapshot_date} is up to date");
        } else {
            self.write_run_metadata(&info, &result)?;
            self.write_manifest(&snapshot_date, &result.units_failed)?;

            let any_success =
                !result.units_succeeded.is_empty() || !result.units_skipped.is_empty();
            if result.units_failed.is_empty() && any_success {
                result.pointer_updated =
                    pointer::update_pointer(&self.layout, &snapshot_date, options.force)?;
            } else if !result.units_failed.is_empty() {
                log::warn!(
                    "Snapshot {snapshot_date}: {} unit(s) failed, pointer not updated",
                    result.units_failed.len()
                );
            }
        }

        result.duration_ms = elapsed_ms(started);
        log::info!(
            "Snapshot {snapshot_date}: {} written, {} skipped, {} failed ({}ms)",
            result.units_succeeded.len(),
            result.units_skipped.len(),
            result.units_failed.len(),
            result.duration_ms,
        );

        Ok(result)
    }

    /// Whether a closing-period run collected on `collection_date` should
    /// replace the snapshot already filed under `snapshot_date`.
    ///
    /// Only strictly newer collection dates win. Missing or unreadable
    /// metadata, or a recorded date that cannot be parsed, allows the
    /// update.
    #[must_use]
    pub fn should_update_snapshot(&self, snapshot_date: &str, collection_date: &str) -> bool {
        let existing = match read_run_metadata(&self.layout, snapshot_date) {
            Ok(Some(existing)) => existing,
            Ok(None) => return true,
            Err(e) => {
                log::warn!("Unreadable metadata for snapshot {snapshot_date}, replacing it: {e}");
                return true;
            }
        };

        let recorded = existing
            .collection_date
            .as_deref()
            .unwrap_or(&existing.data_as_of_date);

        match (parse_date(recorded), parse_date(collection_date)) {
            (Some(recorded), Some(incoming)) => incoming > recorded,
            _ => true,
        }
    }

    fn resolve_units(
        &self,
        requested_date: &str,
        options: &TransformOptions,
    ) -> Result<Vec<String>, SnapshotError> {
        let raw_dir = self.layout.raw_dir(requested_date);
        let no_raw_data = || SnapshotError::NoRawData {
            date: requested_date.to_owned(),
            path: raw_dir.display().to_string(),
        };

        let units = match &options.units {
            Some(requested) => {
                let mut units = requested.clone();
                units.sort();
                units.dedup();
                let any_present = units.iter().any(|id| {
                    is_valid_unit_id(id) && self.layout.raw_unit_dir(requested_date, id).is_dir()
                });
                if !any_present {
                    return Err(no_raw_data());
                }
                units
            }
            None => self.layout.list_raw_units(requested_date),
        };

        if units.is_empty() {
            return Err(no_raw_data());
        }
        Ok(units)
    }

    /// Returns `Ok(true)` if the unit file was written, `Ok(false)` if it
    /// already existed.
    fn transform_unit(
        &self,
        requested_date: &str,
        snapshot_date: &str,
        unit_id: &str,
        force: bool,
    ) -> Result<bool, SnapshotError> {
        if !is_valid_unit_id(unit_id) {
            return Err(SnapshotError::InvalidUnitId(unit_id.to_owned()));
        }

        let path = self.layout.unit_snapshot_path(snapshot_date, unit_id);
        if path.is_file() && !force {
            return Ok(false);
        }

        let date = parse_date(snapshot_date)
            .ok_or_else(|| SnapshotError::InvalidDate(snapshot_date.to_owned()))?;
        let raw_unit_dir = self.layout.raw_unit_dir(requested_date, unit_id);
        let snapshot = self.builder.build(&raw_unit_dir, unit_id, date)?;

        if snapshot.snapshot_date != date {
            return Err(SnapshotError::DateMismatch {
                unit_id: unit_id.to_owned(),
                expected: snapshot_date.to_owned(),
                actual: snapshot.snapshot_date.to_string(),
            });
        }

        write_json_atomic(&path, &snapshot)?;
        log::debug!(
            "Unit {unit_id}: wrote {} clubs to {}",
            snapshot.clubs.len(),
            path.display()
        );
        Ok(true)
    }

    fn write_run_metadata(
        &self,
        info: &ClosingPeriodInfo,
        result: &TransformResult,
    ) -> Result<(), SnapshotError> {
        let mut successful_units: Vec<String> = result
            .units_succeeded
            .iter()
            .chain(&result.units_skipped)
            .cloned()
            .collect();
        successful_units.sort();

        let status = match (successful_units.is_empty(), result.units_failed.is_empty()) {
            (false, true) => SnapshotStatus::Success,
            (false, false) => SnapshotStatus::Partial,
            (true, _) => SnapshotStatus::Failed,
        };

        let closing = info.is_closing_period;
        let metadata = SnapshotRunMetadata {
            snapshot_id: info.snapshot_date.clone(),
            schema_version: SCHEMA_VERSION.to_owned(),
            status,
            successful_units,
            failed_units: result.units_failed.clone(),
            data_as_of_date: info.collection_date.clone(),
            created_at: Utc::now().to_rfc3339(),
            is_closing_period_data: closing.then_some(true),
            collection_date: closing.then(|| info.collection_date.clone()),
            logical_date: closing.then(|| info.logical_date.clone()),
            errors: result.errors.clone(),
        };

        write_json_atomic(&self.layout.snapshot_metadata_path(&info.snapshot_date), &metadata)?;
        Ok(())
    }

    fn write_manifest(&self, snapshot_date: &str, failed: &[String]) -> Result<(), SnapshotError> {
        let mut units = Vec::new();

        for unit_id in self.layout.list_snapshot_units(snapshot_date) {
            let path = self.layout.unit_snapshot_path(snapshot_date, &unit_id);
            let file_name = file_name_of(&path);
            let fs_meta = std::fs::metadata(&path)?;
            let last_modified = fs_meta
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

            units.push(SnapshotManifestEntry {
                unit_id,
                file_name,
                status: ManifestEntryStatus::Success,
                size: fs_meta.len(),
                checksum: Some(file_sha256(&path)?),
                last_modified,
            });
        }

        for unit_id in failed {
            if units.iter().any(|e| &e.unit_id == unit_id) {
                continue;
            }
            let path = self.layout.unit_snapshot_path(snapshot_date, unit_id);
            units.push(SnapshotManifestEntry {
                unit_id: unit_id.clone(),
                file_name: file_name_of(&path),
                status: ManifestEntryStatus::Failed,
                size: 0,
                checksum: None,
                last_modified: None,
            });
        }

        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let successful_units = units
            .iter()
            .filter(|e| e.status == ManifestEntryStatus::Success)
            .count();
        let manifest = SnapshotManifest {
            snapshot_id: snapshot_date.to_owned(),
            created_at: Utc::now().to_rfc3339(),
            total_units: units.len(),
            successful_units,
            failed_units: units.len() - successful_units,
            total_size: units.iter().map(|e| e.size).sum(),
            units,
        };

        write_json_atomic(&self.layout.snapshot_manifest_path(snapshot_date), &manifest)?;
        Ok(())
    }
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;
    use district_stats_snapshot_models::{CacheMetadata, UnitSnapshot};
    use district_stats_store::read_json_optional;

    use super::*;
    use crate::builder::CsvStatisticsBuilder;
    use crate::read_unit_snapshot;

    const CSV: &str = "\
Club Number,Club Name,Division,Area,Active Members,Mem. Base,Goals Met,Club Status,Oct. Ren.,Apr. Ren.,New Members
1001,Alpha Talkers,A,A1,24,20,6,Active,15,0,6
2002,Beta Speakers,A,A2,9,14,1,Active,5,,1
";

    fn setup(name: &str) -> CacheLayout {
        let root = std::env::temp_dir().join(format!("district_stats_transform_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        CacheLayout::new(root)
    }

    fn teardown(layout: &CacheLayout) {
        let _ = std::fs::remove_dir_all(layout.root());
    }

    fn write_raw_unit(layout: &CacheLayout, date: &str, unit_id: &str, csv: &str) {
        let dir = layout.raw_unit_dir(date, unit_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("club-performance.csv"), csv).unwrap();
    }

    fn write_closing_metadata(layout: &CacheLayout, date: &str, month: &str) {
        let metadata = CacheMetadata {
            date: date.to_string(),
            is_closing_period: Some(true),
            data_month: Some(month.to_string()),
            ..CacheMetadata::default()
        };
        write_json_atomic(&layout.raw_metadata_path(date), &metadata).unwrap();
    }

    fn service(layout: &CacheLayout) -> TransformService<CsvStatisticsBuilder> {
        TransformService::new(layout.clone(), CsvStatisticsBuilder)
    }

    #[test]
    fn closing_period_files_under_month_end() {
        let layout = setup("closing");
        write_raw_unit(&layout, "2025-01-05", "42", CSV);
        write_closing_metadata(&layout, "2025-01-05", "2024-12");

        let result = service(&layout)
            .transform("2025-01-05", &TransformOptions::default())
            .unwrap();

        assert_eq!(result.snapshot_date, "2024-12-31");
        assert_eq!(result.units_succeeded, vec!["42"]);
        assert!(result.pointer_updated);

        let snapshot = read_unit_snapshot(&layout, "2024-12-31", "42")
            .unwrap()
            .unwrap();
        assert_eq!(
            snapshot.snapshot_date,
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );

        let metadata = read_run_metadata(&layout, "2024-12-31").unwrap().unwrap();
        assert_eq!(metadata.status, SnapshotStatus::Success);
        assert_eq!(metadata.is_closing_period_data, Some(true));
        assert_eq!(metadata.collection_date.as_deref(), Some("2025-01-05"));
        assert_eq!(metadata.logical_date.as_deref(), Some("2024-12-31"));

        assert_eq!(
            pointer::read_pointer(&layout).unwrap().snapshot_id,
            "2024-12-31"
        );
        assert!(!layout.snapshot_dir("2025-01-05").exists());

        teardown(&layout);
    }

    #[test]
    fn newer_closing_data_wins() {
        let layout = setup("newer_wins");
        write_raw_unit(&layout, "2025-01-07", "42", CSV);
        write_closing_metadata(&layout, "2025-01-07", "2024-12");
        write_raw_unit(&layout, "2025-01-03", "42", CSV);
        write_closing_metadata(&layout, "2025-01-03", "2024-12");

        let svc = service(&layout);
        svc.transform("2025-01-07", &TransformOptions::default())
            .unwrap();

        let metadata_path = layout.snapshot_metadata_path("2024-12-31");
        let before = std::fs::read(&metadata_path).unwrap();

        let older = svc
            .transform("2025-01-03", &TransformOptions::default())
            .unwrap();
        assert!(older.skipped_run);
        assert!(older.units_succeeded.is_empty());
        assert_eq!(std::fs::read(&metadata_path).unwrap(), before);

        let forced = svc
            .transform(
                "2025-01-03",
                &TransformOptions {
                    units: None,
                    force: true,
                },
            )
            .unwrap();
        assert!(!forced.skipped_run);
        assert_eq!(forced.units_succeeded, vec!["42"]);
        let metadata = read_run_metadata(&layout, "2024-12-31").unwrap().unwrap();
        assert_eq!(metadata.collection_date.as_deref(), Some("2025-01-03"));

        teardown(&layout);
    }

    #[test]
    fn later_closing_collection_replaces_snapshot() {
        let layout = setup("later_replaces");
        write_raw_unit(&layout, "2025-01-03", "42", CSV);
        write_closing_metadata(&layout, "2025-01-03", "2024-12");
        write_raw_unit(
            &layout,
            "2025-01-07",
            "42",
            "\
Club Number,Club Name,Division,Area,Active Members,Mem. Base,Goals Met,Club Status,Oct. Ren.,Apr. Ren.,New Members
1001,Alpha Talkers,A,A1,30,20,7,Active,15,0,10
",
        );
        write_closing_metadata(&layout, "2025-01-07", "2024-12");

        let svc = service(&layout);
        let first = svc
            .transform("2025-01-03", &TransformOptions::default())
            .unwrap();
        assert_eq!(first.units_succeeded, vec!["42"]);

        let later = svc
            .transform("2025-01-07", &TransformOptions::default())
            .unwrap();
        assert!(!later.skipped_run);
        assert_eq!(later.units_succeeded, vec!["42"]);
        assert!(later.units_skipped.is_empty());

        let snapshot = read_unit_snapshot(&layout, "2024-12-31", "42")
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.totals.total_membership, 30);
        assert_eq!(snapshot.clubs.len(), 1);

        let metadata = read_run_metadata(&layout, "2024-12-31").unwrap().unwrap();
        assert_eq!(metadata.collection_date.as_deref(), Some("2025-01-07"));
        assert_eq!(
            pointer::read_pointer(&layout).unwrap().snapshot_id,
            "2024-12-31"
        );

        teardown(&layout);
    }

    #[test]
    fn same_collection_date_does_not_replace() {
        let layout = setup("same_date");
        write_raw_unit(&layout, "2025-01-05", "42", CSV);
        write_closing_metadata(&layout, "2025-01-05", "2024-12");

        let svc = service(&layout);
        svc.transform("2025-01-05", &TransformOptions::default())
            .unwrap();

        assert!(!svc.should_update_snapshot("2024-12-31", "2025-01-05"));
        assert!(!svc.should_update_snapshot("2024-12-31", "2025-01-04"));
        assert!(svc.should_update_snapshot("2024-12-31", "2025-01-06"));
        assert!(svc.should_update_snapshot("2023-12-31", "2024-01-02"));

        teardown(&layout);
    }

    #[test]
    fn rerun_is_a_no_op() {
        let layout = setup("idempotent");
        write_raw_unit(&layout, "2025-02-10", "42", CSV);
        write_raw_unit(&layout, "2025-02-10", "7", CSV);

        let svc = service(&layout);
        let first = svc
            .transform("2025-02-10", &TransformOptions::default())
            .unwrap();
        assert_eq!(first.units_succeeded, vec!["42", "7"]);

        let metadata_path = layout.snapshot_metadata_path("2025-02-10");
        let manifest_path = layout.snapshot_manifest_path("2025-02-10");
        let unit_path = layout.unit_snapshot_path("2025-02-10", "42");
        let metadata = std::fs::read(&metadata_path).unwrap();
        let manifest = std::fs::read(&manifest_path).unwrap();
        let unit = std::fs::read(&unit_path).unwrap();

        let second = svc
            .transform("2025-02-10", &TransformOptions::default())
            .unwrap();
        assert!(second.units_succeeded.is_empty());
        assert_eq!(second.units_skipped, vec!["42", "7"]);
        assert!(!second.pointer_updated);

        assert_eq!(std::fs::read(&metadata_path).unwrap(), metadata);
        assert_eq!(std::fs::read(&manifest_path).unwrap(), manifest);
        assert_eq!(std::fs::read(&unit_path).unwrap(), unit);

        teardown(&layout);
    }

    #[test]
    fn partial_failure_keeps_pointer() {
        let layout = setup("partial");
        write_raw_unit(&layout, "2025-01-31", "42", CSV);
        service(&layout)
            .transform("2025-01-31", &TransformOptions::default())
            .unwrap();

        write_raw_unit(&layout, "2025-02-28", "42", CSV);
        write_raw_unit(&layout, "2025-02-28", "7", "Name,Members\nx,1\n");

        let result = service(&layout)
            .transform("2025-02-28", &TransformOptions::default())
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.units_succeeded, vec!["42"]);
        assert_eq!(result.units_failed, vec!["7"]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].unit_id.as_deref(), Some("7"));
        assert!(!result.pointer_updated);
        assert_eq!(
            pointer::read_pointer(&layout).unwrap().snapshot_id,
            "2025-01-31"
        );

        let metadata = read_run_metadata(&layout, "2025-02-28").unwrap().unwrap();
        assert_eq!(metadata.status, SnapshotStatus::Partial);
        assert_eq!(metadata.failed_units, vec!["7"]);
        assert!(metadata.is_closing_period_data.is_none());

        let manifest: SnapshotManifest =
            read_json_optional(&layout.snapshot_manifest_path("2025-02-28"))
                .unwrap()
                .unwrap();
        assert_eq!(manifest.total_units, 2);
        assert_eq!(manifest.successful_units, 1);
        assert_eq!(manifest.failed_units, 1);
        assert_eq!(manifest.units[0].unit_id, "42");
        assert!(manifest.units[0].checksum.is_some());
        assert!(manifest.units[0].size > 0);
        assert_eq!(manifest.units[1].status, ManifestEntryStatus::Failed);
        assert!(!layout.unit_snapshot_path("2025-02-28", "7").exists());

        teardown(&layout);
    }

    #[test]
    fn older_run_does_not_regress_pointer() {
        let layout = setup("no_regress");
        write_raw_unit(&layout, "2025-03-31", "42", CSV);
        write_raw_unit(&layout, "2025-02-28", "42", CSV);

        let svc = service(&layout);
        svc.transform("2025-03-31", &TransformOptions::default())
            .unwrap();
        let backfill = svc
            .transform("2025-02-28", &TransformOptions::default())
            .unwrap();

        assert!(backfill.success());
        assert!(!backfill.pointer_updated);
        assert_eq!(
            pointer::read_pointer(&layout).unwrap().snapshot_id,
            "2025-03-31"
        );

        teardown(&layout);
    }

    #[test]
    fn missing_raw_data_is_fatal() {
        let layout = setup("no_raw");

        let result = service(&layout).transform("2025-01-05", &TransformOptions::default());
        assert!(matches!(result, Err(SnapshotError::NoRawData { .. })));

        let result = service(&layout).transform("2025-1-5", &TransformOptions::default());
        assert!(matches!(result, Err(SnapshotError::InvalidDate(_))));

        write_raw_unit(&layout, "2025-01-05", "42", CSV);
        let result = service(&layout).transform(
            "2025-01-05",
            &TransformOptions {
                units: Some(vec!["99".to_string()]),
                force: false,
            },
        );
        assert!(matches!(result, Err(SnapshotError::NoRawData { .. })));

        teardown(&layout);
    }

    #[test]
    fn mismatched_builder_date_is_rejected() {
        struct WrongDate;

        impl StatisticsBuilder for WrongDate {
            fn build(
                &self,
                _raw_unit_dir: &Path,
                unit_id: &str,
                _snapshot_date: NaiveDate,
            ) -> Result<UnitSnapshot, SnapshotError> {
                let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
                Ok(crate::builder::assemble_snapshot(unit_id, date, Vec::new()))
            }
        }

        let layout = setup("wrong_date");
        write_raw_unit(&layout, "2025-01-05", "42", CSV);

        let result = TransformService::new(layout.clone(), WrongDate)
            .transform("2025-01-05", &TransformOptions::default())
            .unwrap();
        assert_eq!(result.units_failed, vec!["42"]);
        assert!(!layout.unit_snapshot_path("2025-01-05", "42").exists());

        teardown(&layout);
    }
}
