//! Reading and writing analytics artifacts and the analytics manifest.

use chrono::Utc;
use district_stats_analytics_models::{
    AnalyticsArtifact, AnalyticsManifest, AnalyticsManifestEntry, AnalyticsType, ArtifactMetadata,
};
use district_stats_snapshot_models::SCHEMA_VERSION;
use district_stats_store::{
    CacheLayout, file_sha256, read_json_optional, sha256_hex, write_json_atomic,
};
use serde::{Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::AnalyticsError;

/// SHA-256 of the compact JSON serialization of `data`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Json`] if `data` cannot be serialized.
pub fn data_checksum<T: Serialize + ?Sized>(data: &T) -> Result<String, AnalyticsError> {
    Ok(sha256_hex(&serde_json::to_vec(data)?))
}

/// Wraps `data` in its envelope and writes it atomically. Returns the
/// number of bytes written.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if serialization or the write fails.
pub fn write_artifact<T: Serialize>(
    layout: &CacheLayout,
    snapshot_date: &str,
    unit_id: &str,
    kind: AnalyticsType,
    data: T,
    source_snapshot_checksum: &str,
) -> Result<u64, AnalyticsError> {
    let artifact = AnalyticsArtifact {
        metadata: ArtifactMetadata {
            schema_version: SCHEMA_VERSION.to_owned(),
            computed_at: Utc::now().to_rfc3339(),
            snapshot_date: snapshot_date.to_owned(),
            unit_id: unit_id.to_owned(),
            checksum: data_checksum(&data)?,
            source_snapshot_checksum: Some(source_snapshot_checksum.to_owned()),
        },
        data,
    };

    let path = layout.analytics_artifact_path(snapshot_date, unit_id, kind.as_ref());
    let size = write_json_atomic(&path, &artifact)?;
    log::debug!("Wrote {} ({size} bytes)", path.display());
    Ok(size)
}

/// Reads one artifact, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the file exists but cannot be
/// parsed as `T`.
pub fn read_artifact<T: DeserializeOwned>(
    layout: &CacheLayout,
    snapshot_date: &str,
    unit_id: &str,
    kind: AnalyticsType,
) -> Result<Option<AnalyticsArtifact<T>>, AnalyticsError> {
    Ok(read_json_optional(&layout.analytics_artifact_path(
        snapshot_date,
        unit_id,
        kind.as_ref(),
    ))?)
}

/// The source snapshot checksum recorded in an existing artifact. Missing
/// or unreadable artifacts yield `None`, which forces recomputation.
#[must_use]
pub fn stored_source_checksum(
    layout: &CacheLayout,
    snapshot_date: &str,
    unit_id: &str,
    kind: AnalyticsType,
) -> Option<String> {
    match read_artifact::<IgnoredAny>(layout, snapshot_date, unit_id, kind) {
        Ok(artifact) => artifact.and_then(|a| a.metadata.source_snapshot_checksum),
        Err(e) => {
            log::debug!("Unit {unit_id}: unreadable {kind} artifact, recomputing: {e}");
            None
        }
    }
}

/// Splits `unit_{id}_{type}.json` into its unit ID and artifact type.
#[must_use]
pub fn parse_artifact_file_name(name: &str) -> Option<(String, AnalyticsType)> {
    let stem = name.strip_prefix("unit_")?.strip_suffix(".json")?;
    let (unit_id, kind) = stem.split_once('_')?;
    if unit_id.is_empty() || !unit_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((unit_id.to_owned(), kind.parse().ok()?))
}

/// Scans a snapshot date's analytics directory and rewrites its manifest.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the directory or an artifact cannot be
/// read, or the manifest cannot be written.
pub fn write_manifest(
    layout: &CacheLayout,
    snapshot_date: &str,
) -> Result<AnalyticsManifest, AnalyticsError> {
    let dir = layout.analytics_dir(snapshot_date);
    let mut files = Vec::new();

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Some((unit_id, kind)) = parse_artifact_file_name(&name) else {
            continue;
        };

        let path = entry.path();
        files.push(AnalyticsManifestEntry {
            filename: name,
            unit_id,
            kind: kind.to_string(),
            size: entry.metadata()?.len(),
            checksum: file_sha256(&path)?,
        });
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    let manifest = AnalyticsManifest::new(
        snapshot_date,
        Utc::now().to_rfc3339(),
        SCHEMA_VERSION,
        files,
    );
    write_json_atomic(&layout.analytics_manifest_path(snapshot_date), &manifest)?;
    log::info!(
        "Analytics manifest for {snapshot_date}: {} file(s), {} bytes",
        manifest.total_files,
        manifest.total_size
    );

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_through_layout() {
        let name = CacheLayout::analytics_file_name("42", AnalyticsType::ClubHealth.as_ref());
        assert_eq!(name, "unit_42_club-health.json");
        assert_eq!(
            parse_artifact_file_name(&name),
            Some(("42".to_string(), AnalyticsType::ClubHealth))
        );
        assert_eq!(parse_artifact_file_name("manifest.json"), None);
        assert_eq!(parse_artifact_file_name("unit_42_bogus.json"), None);
        assert_eq!(parse_artifact_file_name("unit_42_membership.json.tmp"), None);
    }

    #[test]
    fn checksum_covers_data_only() {
        let root = std::env::temp_dir().join("district_stats_artifact_checksum");
        let _ = std::fs::remove_dir_all(&root);
        let layout = CacheLayout::new(&root);

        let data = serde_json::json!({"total": 3});
        write_artifact(&layout, "2025-01-31", "42", AnalyticsType::Membership, &data, "abc")
            .unwrap();

        let artifact: AnalyticsArtifact<serde_json::Value> =
            read_artifact(&layout, "2025-01-31", "42", AnalyticsType::Membership)
                .unwrap()
                .unwrap();
        assert_eq!(artifact.metadata.checksum, sha256_hex(br#"{"total":3}"#));
        assert_eq!(
            stored_source_checksum(&layout, "2025-01-31", "42", AnalyticsType::Membership)
                .as_deref(),
            Some("abc")
        );
        assert_eq!(
            stored_source_checksum(&layout, "2025-01-31", "42", AnalyticsType::Analytics),
            None
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn manifest_totals_match_files() {
        let root = std::env::temp_dir().join("district_stats_artifact_manifest");
        let _ = std::fs::remove_dir_all(&root);
        let layout = CacheLayout::new(&root);

        for unit in ["42", "7"] {
            for kind in [AnalyticsType::Membership, AnalyticsType::Analytics] {
                write_artifact(&layout, "2025-01-31", unit, kind, &[1, 2, 3], "src").unwrap();
            }
        }

        let manifest = write_manifest(&layout, "2025-01-31").unwrap();
        assert_eq!(manifest.total_files, 4);
        assert_eq!(manifest.total_files, manifest.files.len());
        assert_eq!(
            manifest.total_size,
            manifest.files.iter().map(|f| f.size).sum::<u64>()
        );
        assert!(manifest.files.iter().all(|f| f.filename != "manifest.json"));

        let rewritten = write_manifest(&layout, "2025-01-31").unwrap();
        assert_eq!(rewritten.total_files, 4);

        let _ = std::fs::remove_dir_all(&root);
    }
}
