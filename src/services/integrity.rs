//! Content hashing and integrity records.
//!
//! Every installed package directory carries a `.integrity` file mapping
//! relative path -> sha256 digest. The record is written after a verified
//! install/sync and checked by `status`; a digest mismatch before a write
//! aborts the whole operation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

pub const INTEGRITY_FILE: &str = ".integrity";

#[derive(thiserror::Error, Debug)]
pub enum IntegrityError {
    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    Mismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityRecord {
    pub version: String,
    pub installed_at: String,
    pub files: BTreeMap<String, String>,
}

pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a downloaded file against the digest the catalog supplied.
pub fn verify_expected(path: &str, content: &str, expected: &str) -> Result<(), IntegrityError> {
    let actual = hash_content(content);
    if actual != expected {
        return Err(IntegrityError::Mismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

pub fn write_integrity_record(
    dir: &Path,
    version: &str,
    files: &BTreeMap<String, String>,
) -> anyhow::Result<()> {
    let record = IntegrityRecord {
        version: version.to_string(),
        installed_at: chrono::Utc::now().to_rfc3339(),
        files: files.clone(),
    };
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join(INTEGRITY_FILE),
        serde_json::to_string_pretty(&record)?,
    )?;
    Ok(())
}

pub fn load_integrity_record(dir: &Path) -> anyhow::Result<Option<IntegrityRecord>> {
    let path = dir.join(INTEGRITY_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Recompute digests for every recorded file and return the paths whose
/// digest differs or whose file is missing. A directory without a record
/// verifies clean.
pub fn verify_integrity(dir: &Path) -> anyhow::Result<Vec<String>> {
    let Some(record) = load_integrity_record(dir)? else {
        return Ok(Vec::new());
    };
    let mut failing = Vec::new();
    for (path, expected) in &record.files {
        let full = dir.join(path);
        match std::fs::read_to_string(&full) {
            Ok(content) if &hash_content(&content) == expected => {}
            _ => failing.push(path.clone()),
        }
    }
    Ok(failing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn digest_is_stable_sha256_hex() {
        let d = hash_content("hello");
        assert_eq!(d.len(), 64);
        assert_eq!(d, hash_content("hello"));
        assert_ne!(d, hash_content("hello!"));
    }

    #[test]
    fn verify_expected_rejects_tampered_content() {
        let good = hash_content("original");
        assert!(verify_expected("a.md", "original", &good).is_ok());
        let err = verify_expected("a.md", "tampered", &good).unwrap_err();
        assert!(err.to_string().contains("a.md"));
    }

    #[test]
    fn round_trip_and_detect_mutation() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("MANIFEST.md"), "# Pack\n").unwrap();
        std::fs::write(dir.join("notes.md"), "notes\n").unwrap();

        let mut files = BTreeMap::new();
        files.insert("MANIFEST.md".to_string(), hash_content("# Pack\n"));
        files.insert("notes.md".to_string(), hash_content("notes\n"));
        write_integrity_record(dir, "1.0.0", &files).unwrap();

        assert!(verify_integrity(dir).unwrap().is_empty());

        std::fs::write(dir.join("notes.md"), "edited\n").unwrap();
        std::fs::remove_file(dir.join("MANIFEST.md")).unwrap();
        let mut failing = verify_integrity(dir).unwrap();
        failing.sort();
        assert_eq!(failing, vec!["MANIFEST.md".to_string(), "notes.md".to_string()]);
    }
}
