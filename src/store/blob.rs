//! Blob storage for uploaded files, archived submissions and
//! classification results.
//!
//! Keys have the form `<prefix>/<name>`. The prefix acts as a collection
//! name; see [`FILES_PREFIX`], [`RESPONSES_PREFIX`] and [`RESULTS_PREFIX`].

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const FILES_PREFIX: &str = "files";
pub const RESPONSES_PREFIX: &str = "responses";
pub const RESULTS_PREFIX: &str = "results";

/// Listing entry for one stored blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobEntry {
    pub key: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Opaque key/value blob storage.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ServiceError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError>;

    /// List blobs under `prefix`, sorted by key. Zero-byte folder markers
    /// are skipped.
    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, ServiceError>;

    fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

/// Build a `<prefix>/<name>` key, rejecting names that could escape the
/// prefix.
pub fn blob_key(prefix: &str, name: &str) -> Result<String, ServiceError> {
    check_segment(prefix)?;
    check_segment(name)?;
    Ok(format!("{}/{}", prefix, name))
}

fn check_segment(segment: &str) -> Result<(), ServiceError> {
    if segment.is_empty()
        || segment == "."
        || segment.contains("..")
        || segment.contains(['/', '\\'])
    {
        return Err(ServiceError::Validation(format!(
            "invalid blob name: '{}'",
            segment
        )));
    }
    Ok(())
}

/// Blob store backed by a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let (prefix, name) = key
            .split_once('/')
            .ok_or_else(|| ServiceError::Validation(format!("invalid blob key: '{}'", key)))?;
        check_segment(prefix)?;
        check_segment(name)?;
        Ok(self.root.join(prefix).join(name))
    }
}

fn upstream_error(path: &Path, e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Upstream(format!("blob store {}: {}", path.display(), e))
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| upstream_error(dir, e))?;
        }
        fs::write(&path, bytes).map_err(|e| upstream_error(&path, e))?;
        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ServiceError::NotFound(format!("blob {}", key)),
            _ => upstream_error(&path, e),
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, ServiceError> {
        check_segment(prefix)?;
        let dir = self.root.join(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| upstream_error(&dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| upstream_error(entry.path(), e))?;
            if metadata.len() == 0 {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            entries.push(BlobEntry {
                key: format!("{}/{}", prefix, name),
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ServiceError::NotFound(format!("blob {}", key)),
            _ => upstream_error(&path, e),
        })?;
        debug!("Deleted blob {}", key);
        Ok(())
    }
}
