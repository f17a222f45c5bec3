#![allow(clippy::module_name_repetitions)]
//! Canonical file paths inside the cache directory.
//!
//! ```text
//! CACHE_DIR/raw-csv/{date}/metadata.json
//! CACHE_DIR/raw-csv/{date}/all-districts.csv
//! CACHE_DIR/raw-csv/{date}/unit-{id}/{report}.csv
//! CACHE_DIR/snapshots/{date}/unit_{id}.json
//! CACHE_DIR/snapshots/{date}/metadata.json
//! CACHE_DIR/snapshots/{date}/manifest.json
//! CACHE_DIR/snapshots/{date}/all-districts-rankings.json
//! CACHE_DIR/snapshots/{date}/analytics/unit_{id}_{type}.json
//! CACHE_DIR/snapshots/{date}/analytics/manifest.json
//! CACHE_DIR/snapshots/latest-successful.json
//! CACHE_DIR/time-series/unit_{id}/{programYear}.json
//! CACHE_DIR/time-series/unit_{id}/index-metadata.json
//! ```

use std::path::{Path, PathBuf};

const RAW_DIR: &str = "raw-csv";
const SNAPSHOTS_DIR: &str = "snapshots";
const TIME_SERIES_DIR: &str = "time-series";
const ANALYTICS_DIR: &str = "analytics";

const METADATA_FILE: &str = "metadata.json";
const MANIFEST_FILE: &str = "manifest.json";
const POINTER_FILE: &str = "latest-successful.json";
const RANKINGS_FILE: &str = "all-districts-rankings.json";
const SUMMARY_FILE: &str = "all-districts.csv";
const INDEX_METADATA_FILE: &str = "index-metadata.json";

const RAW_UNIT_PREFIX: &str = "unit-";
const UNIT_FILE_PREFIX: &str = "unit_";

/// Resolves every artifact path relative to a cache root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Raw collector output ─────────────────────────────────────────

    /// Directory holding everything collected for `date`.
    #[must_use]
    pub fn raw_dir(&self, date: &str) -> PathBuf {
        self.root.join(RAW_DIR).join(date)
    }

    /// Collector metadata for `date`.
    #[must_use]
    pub fn raw_metadata_path(&self, date: &str) -> PathBuf {
        self.raw_dir(date).join(METADATA_FILE)
    }

    /// Unit-independent summary report for `date`.
    #[must_use]
    pub fn raw_summary_path(&self, date: &str) -> PathBuf {
        self.raw_dir(date).join(SUMMARY_FILE)
    }

    /// Directory holding one unit's raw reports for `date`.
    #[must_use]
    pub fn raw_unit_dir(&self, date: &str, unit_id: &str) -> PathBuf {
        self.raw_dir(date).join(format!("{RAW_UNIT_PREFIX}{unit_id}"))
    }

    /// Unit IDs with a raw directory for `date`, sorted.
    #[must_use]
    pub fn list_raw_units(&self, date: &str) -> Vec<String> {
        list_prefixed(&self.raw_dir(date), RAW_UNIT_PREFIX, None, true)
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Directory containing all snapshot dates.
    #[must_use]
    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// Directory for one snapshot date.
    #[must_use]
    pub fn snapshot_dir(&self, date: &str) -> PathBuf {
        self.snapshots_dir().join(date)
    }

    /// Snapshot file for one unit.
    #[must_use]
    pub fn unit_snapshot_path(&self, date: &str, unit_id: &str) -> PathBuf {
        self.snapshot_dir(date)
            .join(format!("{UNIT_FILE_PREFIX}{unit_id}.json"))
    }

    /// Run metadata for one snapshot date.
    #[must_use]
    pub fn snapshot_metadata_path(&self, date: &str) -> PathBuf {
        self.snapshot_dir(date).join(METADATA_FILE)
    }

    /// Run manifest for one snapshot date.
    #[must_use]
    pub fn snapshot_manifest_path(&self, date: &str) -> PathBuf {
        self.snapshot_dir(date).join(MANIFEST_FILE)
    }

    /// Cross-unit rankings for one snapshot date.
    #[must_use]
    pub fn rankings_path(&self, date: &str) -> PathBuf {
        self.snapshot_dir(date).join(RANKINGS_FILE)
    }

    /// The "latest successful" snapshot pointer.
    #[must_use]
    pub fn pointer_path(&self) -> PathBuf {
        self.snapshots_dir().join(POINTER_FILE)
    }

    /// Snapshot dates present on disk (`YYYY-MM-DD` directories only),
    /// sorted ascending.
    #[must_use]
    pub fn list_snapshot_dates(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.snapshots_dir()) else {
            return Vec::new();
        };
        let mut dates: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .filter(|name| is_iso_date_key(name))
            .collect();
        dates.sort();
        dates
    }

    /// Unit IDs with a snapshot file for `date`, sorted.
    #[must_use]
    pub fn list_snapshot_units(&self, date: &str) -> Vec<String> {
        list_prefixed(&self.snapshot_dir(date), UNIT_FILE_PREFIX, Some(".json"), false)
    }

    // ── Analytics ────────────────────────────────────────────────────

    /// Analytics directory for one snapshot date.
    #[must_use]
    pub fn analytics_dir(&self, date: &str) -> PathBuf {
        self.snapshot_dir(date).join(ANALYTICS_DIR)
    }

    /// File name of one analytics artifact (`unit_{id}_{kind}.json`).
    #[must_use]
    pub fn analytics_file_name(unit_id: &str, kind: &str) -> String {
        format!("{UNIT_FILE_PREFIX}{unit_id}_{kind}.json")
    }

    /// Path of one analytics artifact.
    #[must_use]
    pub fn analytics_artifact_path(&self, date: &str, unit_id: &str, kind: &str) -> PathBuf {
        self.analytics_dir(date)
            .join(Self::analytics_file_name(unit_id, kind))
    }

    /// Analytics manifest for one snapshot date.
    #[must_use]
    pub fn analytics_manifest_path(&self, date: &str) -> PathBuf {
        self.analytics_dir(date).join(MANIFEST_FILE)
    }

    // ── Time series ──────────────────────────────────────────────────

    /// Directory holding one unit's program-year partitions.
    #[must_use]
    pub fn time_series_unit_dir(&self, unit_id: &str) -> PathBuf {
        self.root
            .join(TIME_SERIES_DIR)
            .join(format!("{UNIT_FILE_PREFIX}{unit_id}"))
    }

    /// One program-year partition (e.g. `2024-2025.json`).
    #[must_use]
    pub fn program_year_path(&self, unit_id: &str, program_year: &str) -> PathBuf {
        self.time_series_unit_dir(unit_id)
            .join(format!("{program_year}.json"))
    }

    /// Cross-partition index metadata for one unit.
    #[must_use]
    pub fn time_series_metadata_path(&self, unit_id: &str) -> PathBuf {
        self.time_series_unit_dir(unit_id).join(INDEX_METADATA_FILE)
    }
}

/// Returns `true` if `name` has the shape `YYYY-MM-DD`.
#[must_use]
pub fn is_iso_date_key(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Lists entries of `dir` named `{prefix}{id}{suffix}`, returning the
/// sorted IDs.
fn list_prefixed(dir: &Path, prefix: &str, suffix: Option<&str>, dirs: bool) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir() == dirs))
        .filter_map(|e| e.file_name().to_str().map(str::to_owned))
        .filter_map(|name| {
            let rest = name.strip_prefix(prefix)?;
            let id = match suffix {
                Some(s) => rest.strip_suffix(s)?,
                None => rest,
            };
            (!id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()))
                .then(|| id.to_owned())
        })
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
