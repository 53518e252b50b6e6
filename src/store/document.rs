//! Survey document persistence.
//!
//! The whole state is one JSON document with two maps, `surveys` and
//! `responses`, keyed by survey id. [`JsonFileStore`] replaces the file
//! atomically (temp file in the same directory, then rename) so a crash
//! mid-write leaves the previous document intact.

use crate::error::ServiceError;
use crate::models::{ResponseSet, Survey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyDb {
    #[serde(default)]
    pub surveys: BTreeMap<String, Survey>,
    #[serde(default)]
    pub responses: BTreeMap<String, Vec<ResponseSet>>,
}

impl SurveyDb {
    /// Responses recorded for a survey (empty if none).
    pub fn responses_for(&self, id: &str) -> &[ResponseSet] {
        self.responses.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Storage backend for the survey document.
pub trait SurveyStore: Send + Sync {
    /// Load the current document. A store with no saved state yields an
    /// empty document.
    fn load(&self) -> Result<SurveyDb, ServiceError>;

    /// Replace the stored document.
    fn save(&self, db: &SurveyDb) -> Result<(), ServiceError>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Persistence(format!("{}: {}", path.display(), e))
}

impl SurveyStore for JsonFileStore {
    fn load(&self) -> Result<SurveyDb, ServiceError> {
        if !self.path.exists() {
            info!(
                "No data file at {}, starting with an empty store",
                self.path.display()
            );
            return Ok(SurveyDb::default());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| persistence_error(&self.path, e))?;

        if content.trim().is_empty() {
            return Ok(SurveyDb::default());
        }

        let db: SurveyDb =
            serde_json::from_str(&content).map_err(|e| persistence_error(&self.path, e))?;

        debug!(
            "Loaded {} surveys from {}",
            db.surveys.len(),
            self.path.display()
        );
        Ok(db)
    }

    fn save(&self, db: &SurveyDb) -> Result<(), ServiceError> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| persistence_error(dir, e))?;

        let content =
            serde_json::to_vec_pretty(db).map_err(|e| persistence_error(&self.path, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| persistence_error(dir, e))?;
        tmp.write_all(&content)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| persistence_error(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| persistence_error(&self.path, e.error))?;

        debug!("Saved {} surveys to {}", db.surveys.len(), self.path.display());
        Ok(())
    }
}

/// Keeps nothing between runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl SurveyStore for MemoryStore {
    fn load(&self) -> Result<SurveyDb, ServiceError> {
        Ok(SurveyDb::default())
    }

    fn save(&self, _db: &SurveyDb) -> Result<(), ServiceError> {
        Ok(())
    }
}
