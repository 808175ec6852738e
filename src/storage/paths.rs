//! Multi-path specification parsing.
//!
//! The specification is a JSON array of `{"path": "...", "target_size": N}`
//! entries. Quotas are in bytes.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::StorageError;

/// One data directory with its size quota.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbPath {
    pub path: PathBuf,
    pub target_size: u64,
}

/// Parse a multi-path specification. Empty input means no extra paths.
pub fn parse_db_paths(json: &str) -> Result<Vec<DbPath>, StorageError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let paths: Vec<DbPath> =
        serde_json::from_str(json).map_err(|e| StorageError::InvalidPaths(e.to_string()))?;

    for entry in &paths {
        if entry.path.as_os_str().is_empty() {
            return Err(StorageError::InvalidPaths("empty path".into()));
        }
        if entry.target_size == 0 {
            return Err(StorageError::InvalidPaths(format!(
                "{} has a zero target_size",
                entry.path.display()
            )));
        }
    }

    Ok(paths)
}

/// Primary data directory: the explicit path, else the first multi-path entry.
pub fn resolve_primary(path: &Path, paths: &[DbPath]) -> Result<PathBuf, StorageError> {
    if !path.as_os_str().is_empty() {
        return Ok(path.to_path_buf());
    }
    paths
        .first()
        .map(|entry| entry.path.clone())
        .ok_or(StorageError::NoPath)
}

/// Total quota across all entries, or `None` when no entries are configured.
pub fn total_quota(paths: &[DbPath]) -> Option<u64> {
    if paths.is_empty() {
        None
    } else {
        Some(paths.iter().map(|p| p.target_size).fold(0u64, u64::saturating_add))
    }
}

/// Create every configured directory.
pub fn prepare_dirs(paths: &[DbPath]) -> Result<(), StorageError> {
    for entry in paths {
        std::fs::create_dir_all(&entry.path).map_err(|source| StorageError::Io {
            path: entry.path.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_with_quotas() {
        let paths = parse_db_paths(
            r#"[{"path": "/data/a", "target_size": 100}, {"path": "/data/b", "target_size": 200}]"#,
        )
        .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].path, PathBuf::from("/data/b"));
        assert_eq!(total_quota(&paths), Some(300));
    }

    #[test]
    fn empty_spec_is_allowed() {
        assert!(parse_db_paths("").unwrap().is_empty());
        assert_eq!(total_quota(&[]), None);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(parse_db_paths("{"), Err(StorageError::InvalidPaths(_))));
        assert!(matches!(
            parse_db_paths(r#"[{"path": "", "target_size": 1}]"#),
            Err(StorageError::InvalidPaths(_))
        ));
        assert!(matches!(
            parse_db_paths(r#"[{"path": "/a", "target_size": 0}]"#),
            Err(StorageError::InvalidPaths(_))
        ));
    }

    #[test]
    fn primary_falls_back_to_first_entry() {
        let paths = vec![DbPath { path: "/data/a".into(), target_size: 1 }];
        assert_eq!(resolve_primary(Path::new("/db"), &paths).unwrap(), PathBuf::from("/db"));
        assert_eq!(resolve_primary(Path::new(""), &paths).unwrap(), PathBuf::from("/data/a"));
        assert!(matches!(resolve_primary(Path::new(""), &[]), Err(StorageError::NoPath)));
    }
}
