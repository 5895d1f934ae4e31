//! Error types for backup orchestration.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Concurrency limit exceeded: {max} backup job(s) already running")]
    ConcurrencyLimitExceeded { max: usize },

    #[error("Backup execution failed: {0}")]
    BackupExecution(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Backup {id} is not restorable (status: {status})")]
    BackupNotRestorable { id: String, status: String },

    #[error("Corrupted metadata file {}: {reason}", path.display())]
    MetadataCorrupted { path: PathBuf, reason: String },

    #[error("Invalid backup id: {0:?}")]
    InvalidBackupId(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Checksum mismatch for backup {id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackupError {
    /// Request-level errors are reported to the caller; everything else is
    /// captured into the failing backup's record.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            BackupError::ConcurrencyLimitExceeded { .. }
                | BackupError::BackupNotFound(_)
                | BackupError::BackupNotRestorable { .. }
                | BackupError::InvalidBackupId(_)
                | BackupError::InvalidRequest(_)
                | BackupError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
