//! Filesystem-backed catalog of backup records.
//!
//! One JSON document per backup at `<dir>/<id>.json`. Writes go through a
//! temporary file and a rename so a reader never sees a half-written record.

use crate::models::{is_valid_backup_id, BackupRecord};
use crate::utils::errors::{BackupError, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Result of scanning the metadata directory
#[derive(Debug, Default)]
pub struct Listing {
    pub records: Vec<BackupRecord>,
    /// Files that could not be read or parsed; never fatal
    pub corrupted: Vec<BackupError>,
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Persist a record, replacing any previous version with the same id.
    pub async fn save(&self, record: &BackupRecord) -> Result<()> {
        check_id(&record.id)?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(&record.id);
        let tmp = self.dir.join(format!("{}.{}{}", record.id, RECORD_EXTENSION, TEMP_SUFFIX));
        let json = serde_json::to_vec_pretty(record)?;

        fs::write(&tmp, json).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(backup_id = %record.id, status = %record.status, "Saved backup metadata");
        Ok(())
    }

    /// Load a record by id. `Ok(None)` when no record exists.
    pub async fn load(&self, id: &str) -> Result<Option<BackupRecord>> {
        check_id(id)?;
        let path = self.record_path(id);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BackupError::MetadataCorrupted {
                path,
                reason: e.to_string(),
            })
    }

    /// Read every record in the directory. Unreadable or malformed files are
    /// skipped, logged, and reported in [`Listing::corrupted`].
    pub async fn list_all(&self) -> Result<Listing> {
        let mut listing = Listing::default();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match read_record(&path).await {
                Ok(record) => listing.records.push(record),
                Err(reason) => {
                    warn!("Skipping corrupted metadata {}: {}", path.display(), reason);
                    listing
                        .corrupted
                        .push(BackupError::MetadataCorrupted { path, reason });
                }
            }
        }

        Ok(listing)
    }

    /// Remove a record. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        check_id(id)?;
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_id(id: &str) -> Result<()> {
    if is_valid_backup_id(id) {
        Ok(())
    } else {
        Err(BackupError::InvalidBackupId(id.to_string()))
    }
}

async fn read_record(path: &Path) -> std::result::Result<BackupRecord, String> {
    let bytes = fs::read(path).await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}
