//! Atomic file writes (temp file + rename).
//!
//! The temp file is created next to the target so the final `rename` never
//! crosses a filesystem boundary. On any failure the temp file is removed,
//! leaving the previous version of the target (if any) untouched.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StoreError;

/// Returns the sibling temp path used while writing `path`.
fn temp_path_for(path: &Path) -> Result<PathBuf, StoreError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    Ok(path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id())))
}

/// Writes `bytes` to `path` atomically, creating parent directories as
/// needed. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory, temp file, or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<u64, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp_path = temp_path_for(path)?;

    let result = (|| {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::io(path, e));
    }

    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len() as u64)
}

/// Serializes `value` as pretty JSON (with a trailing newline) and writes
/// it atomically to `path`. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64, StoreError> {
    let mut contents = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    contents.push(b'\n');
    write_atomic(path, &contents)
}

/// Reads and parses a JSON file, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be read or parsed.
pub fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}
