//! The monotonic "latest successful" snapshot pointer.
//!
//! Snapshot IDs are zero-padded ISO dates, so plain string comparison is
//! chronological.

use district_stats_snapshot_models::{SCHEMA_VERSION, SnapshotPointer};
use district_stats_store::{CacheLayout, read_json_optional, write_json_atomic};

use crate::SnapshotError;

/// Reads the current pointer. An unreadable pointer is logged and treated
/// as absent.
#[must_use]
pub fn read_pointer(layout: &CacheLayout) -> Option<SnapshotPointer> {
    match read_json_optional(&layout.pointer_path()) {
        Ok(pointer) => pointer,
        Err(e) => {
            log::warn!("Ignoring unreadable snapshot pointer: {e}");
            None
        }
    }
}

/// Points the "latest successful" marker at `snapshot_id` unless the
/// current pointer is already chronologically newer. `force` allows moving
/// the pointer backwards.
///
/// Returns `true` if the pointer was written.
///
/// # Errors
///
/// Returns [`SnapshotError::Store`] if the pointer cannot be written.
pub fn update_pointer(
    layout: &CacheLayout,
    snapshot_id: &str,
    force: bool,
) -> Result<bool, SnapshotError> {
    if let Some(current) = read_pointer(layout)
        && current.snapshot_id.as_str() > snapshot_id
    {
        if force {
            log::warn!(
                "Forcing pointer back from {} to {snapshot_id}",
                current.snapshot_id
            );
        } else {
            log::info!(
                "Pointer already at newer snapshot {}, leaving it (run was {snapshot_id})",
                current.snapshot_id
            );
            return Ok(false);
        }
    }

    let pointer = SnapshotPointer {
        snapshot_id: snapshot_id.to_owned(),
        updated_at: chrono::Utc::now().to_rfc3339(),
        schema_version: SCHEMA_VERSION.to_owned(),
    };
    write_json_atomic(&layout.pointer_path(), &pointer)?;
    log::info!("Latest successful snapshot is now {snapshot_id}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(name: &str) -> CacheLayout {
        let root = std::env::temp_dir().join(format!("district_stats_pointer_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        CacheLayout::new(root)
    }

    #[test]
    fn never_regresses_without_force() {
        let layout = layout("monotonic");

        assert!(update_pointer(&layout, "2025-01-31", false).unwrap());
        assert!(!update_pointer(&layout, "2024-12-31", false).unwrap());
        assert_eq!(read_pointer(&layout).unwrap().snapshot_id, "2025-01-31");

        assert!(update_pointer(&layout, "2025-01-31", false).unwrap());
        assert!(update_pointer(&layout, "2025-02-28", false).unwrap());
        assert_eq!(read_pointer(&layout).unwrap().snapshot_id, "2025-02-28");

        let _ = std::fs::remove_dir_all(layout.root());
    }

    #[test]
    fn force_moves_backwards() {
        let layout = layout("forced");

        update_pointer(&layout, "2025-01-31", false).unwrap();
        assert!(update_pointer(&layout, "2024-12-31", true).unwrap());
        assert_eq!(read_pointer(&layout).unwrap().snapshot_id, "2024-12-31");

        let _ = std::fs::remove_dir_all(layout.root());
    }
}
