//! SHA-256 content checksums.

use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::StoreError;

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Returns the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be read.
pub fn file_sha256(path: &Path) -> Result<String, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
    Ok(sha256_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn single_byte_change_changes_digest() {
        assert_ne!(sha256_hex(b"membership: 20"), sha256_hex(b"membership: 21"));
    }
}
