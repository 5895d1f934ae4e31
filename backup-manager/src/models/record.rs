//! Backup record types.
//!
//! A record is serialized as `<backup_dir>/metadata/<id>.json` and is the
//! catalog entry for one backup artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a backup job. Only moves forward out of `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    InProgress,
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::InProgress => "in_progress",
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackupStatus::InProgress)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: BackupStatus,
    pub artifact_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(default)]
    pub duration_millis: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Present only for partial backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupRecord {
    /// Start a new record in `InProgress`.
    pub fn new(id: String, artifact_path: PathBuf, tables: Option<Vec<String>>) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            status: BackupStatus::InProgress,
            artifact_path,
            size_bytes: None,
            duration_millis: 0,
            checksum: None,
            tables,
            error: None,
        }
    }

    /// Move to `Completed`. Returns false (and leaves the record untouched)
    /// if the record already reached a terminal state.
    pub fn complete(&mut self, size_bytes: u64, checksum: String, duration_millis: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = BackupStatus::Completed;
        self.size_bytes = Some(size_bytes);
        self.checksum = Some(checksum);
        self.duration_millis = duration_millis;
        self.error = None;
        true
    }

    /// Move to `Failed`. Same forward-only rule as [`complete`](Self::complete).
    pub fn fail(&mut self, error: impl Into<String>, duration_millis: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = BackupStatus::Failed;
        self.size_bytes = None;
        self.checksum = None;
        self.duration_millis = duration_millis;
        self.error = Some(error.into());
        true
    }

    pub fn is_restorable(&self) -> bool {
        self.status == BackupStatus::Completed
    }
}

/// Generate a unique backup id: UTC timestamp plus a random suffix so that
/// jobs started within the same millisecond never collide.
pub fn generate_backup_id() -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("backup-{}-{}", timestamp, &suffix[..8])
}

/// Ids become file names, so anything that could escape the metadata or
/// backup directory is rejected.
pub fn is_valid_backup_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.')
        && !id.contains("..")
}
