//! Backup orchestrator - runs backup jobs end to end.
//!
//! A job goes through admission, an `in_progress` metadata write, the dump
//! process, checksum computation, a terminal metadata write, and finally
//! retention cleanup. Dump failures are recorded on the returned record
//! rather than raised; only request-level problems come back as errors.

pub mod admission;
pub mod retention;

use crate::config::{BackupConfig, Config};
use crate::fs::checksum::compute_checksum;
use crate::models::{generate_backup_id, BackupRecord, BackupStatus};
use crate::process::{DatabaseTool, PgTool};
use crate::restore::{verify_integrity, RestoreCoordinator};
use crate::store::MetadataStore;
use crate::utils::errors::{BackupError, Result};
use admission::AdmissionControl;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// File extension of dump artifacts
pub const ARTIFACT_EXTENSION: &str = "dump";

/// Error recorded on jobs found stuck in `in_progress`
pub const INTERRUPTED_ERROR: &str = "interrupted before completion";

/// Per-call backup options
#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    /// Restrict the dump to these tables
    pub tables: Option<Vec<String>>,
}

impl BackupRequest {
    pub fn tables(tables: Vec<String>) -> Self {
        Self {
            tables: Some(tables),
        }
    }

    /// Empty table lists mean a full backup
    fn normalized(self) -> Result<Option<Vec<String>>> {
        match self.tables {
            Some(tables) if tables.is_empty() => Ok(None),
            Some(tables) => {
                if tables.iter().any(|t| t.trim().is_empty()) {
                    return Err(BackupError::InvalidRequest(
                        "table names must not be empty".to_string(),
                    ));
                }
                Ok(Some(tables))
            }
            None => Ok(None),
        }
    }
}

pub struct BackupOrchestrator {
    config: Arc<BackupConfig>,
    store: MetadataStore,
    tool: Arc<dyn DatabaseTool>,
    admission: AdmissionControl,
    restorer: RestoreCoordinator,
    cancel_token: CancellationToken,
}

impl BackupOrchestrator {
    /// Create an orchestrator (no cancellation support)
    pub fn new(config: BackupConfig, tool: Arc<dyn DatabaseTool>) -> Self {
        Self::with_cancel(config, tool, CancellationToken::new())
    }

    /// Create an orchestrator whose running processes are killed when
    /// `cancel_token` fires
    pub fn with_cancel(
        config: BackupConfig,
        tool: Arc<dyn DatabaseTool>,
        cancel_token: CancellationToken,
    ) -> Self {
        let store = MetadataStore::new(config.metadata_dir());
        let admission = AdmissionControl::new(config.max_concurrent_backups);
        let restorer = RestoreCoordinator::new(
            store.clone(),
            Arc::clone(&tool),
            config.verify_before_restore,
            cancel_token.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            tool,
            admission,
            restorer,
            cancel_token,
        }
    }

    /// Orchestrator backed by the PostgreSQL client tools
    pub fn from_config(config: &Config, cancel_token: CancellationToken) -> Self {
        let tool = Arc::new(PgTool::from_config(config));
        Self::with_cancel(config.backup.clone(), tool, cancel_token)
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.config
            .backup_dir
            .join(format!("{}.{}", id, ARTIFACT_EXTENSION))
    }

    /// Full backup using the process-wide configuration.
    pub async fn create_backup(&self) -> Result<BackupRecord> {
        self.create_backup_with(BackupRequest::default()).await
    }

    pub async fn create_backup_with(&self, request: BackupRequest) -> Result<BackupRecord> {
        let tables = request.normalized()?;
        let id = generate_backup_id();

        // Released on every exit path when dropped
        let slot = self.admission.try_admit(&id)?;

        tokio::fs::create_dir_all(&self.config.backup_dir).await?;

        let mut record = BackupRecord::new(id.clone(), self.artifact_path(&id), tables);
        self.store.save(&record).await?;

        info!(
            backup_id = %id,
            "Starting backup ({} of {} slots in use)",
            self.admission.running_count(),
            self.admission.max_concurrent()
        );

        let started = Instant::now();
        let outcome = self.run_dump(&record).await;
        let elapsed = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((size_bytes, checksum)) => {
                record.complete(size_bytes, checksum, elapsed);
                info!(backup_id = %id, "Backup completed: {} bytes in {}ms", size_bytes, elapsed);
            }
            Err(e) => {
                error!(backup_id = %id, "Backup failed: {}", e);
                discard_partial_artifact(&record.artifact_path).await;
                record.fail(e.to_string(), elapsed);
            }
        }

        self.store.save(&record).await?;
        drop(slot);

        if record.status == BackupStatus::Completed {
            let removed = self.cleanup_expired(&record.id).await;
            if !removed.is_empty() {
                info!("Retention removed {} expired backup(s)", removed.len());
            }
        }

        Ok(record)
    }

    async fn run_dump(&self, record: &BackupRecord) -> Result<(u64, String)> {
        let artifact = &record.artifact_path;
        self.tool
            .dump(artifact, record.tables.as_deref(), &self.cancel_token)
            .await?;

        let metadata = tokio::fs::metadata(artifact).await.map_err(|e| {
            BackupError::BackupExecution(format!(
                "artifact {} missing after dump: {}",
                artifact.display(),
                e
            ))
        })?;
        if !metadata.is_file() {
            return Err(BackupError::BackupExecution(format!(
                "artifact {} is not a regular file",
                artifact.display()
            )));
        }

        let checksum = compute_checksum(artifact).await.map_err(|e| {
            BackupError::BackupExecution(format!(
                "failed to checksum {}: {}",
                artifact.display(),
                e
            ))
        })?;

        Ok((metadata.len(), checksum))
    }

    /// All backups, newest first. Corrupted metadata files are skipped.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let mut records = self.store.list_all().await?.records;
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    pub async fn get_backup(&self, id: &str) -> Result<BackupRecord> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| BackupError::BackupNotFound(id.to_string()))
    }

    /// Restore the database from a completed backup.
    pub async fn restore_from_backup(&self, id: &str) -> Result<BackupRecord> {
        self.restorer.restore(id).await
    }

    /// Whether a completed backup's artifact still matches its checksum.
    pub async fn verify_backup(&self, id: &str) -> Result<bool> {
        let record = self.get_backup(id).await?;
        if record.status != BackupStatus::Completed {
            return Ok(false);
        }

        match verify_integrity(&record).await {
            Ok(()) => Ok(true),
            Err(e @ (BackupError::ChecksumMismatch { .. } | BackupError::BackupExecution(_))) => {
                warn!(backup_id = %id, "Verification failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a backup's artifact and metadata. Running jobs cannot be deleted.
    pub async fn delete_backup(&self, id: &str) -> Result<()> {
        let record = self.get_backup(id).await?;
        if self.admission.is_active(id) {
            return Err(BackupError::InvalidRequest(format!(
                "backup {} is still running",
                id
            )));
        }

        if retention::remove_backup(&self.store, &record).await {
            info!(backup_id = %id, "Deleted backup");
            Ok(())
        } else {
            Err(BackupError::BackupExecution(format!(
                "backup {} could only be partially deleted",
                id
            )))
        }
    }

    /// Purge backups older than the retention window, except `keep_id` and
    /// jobs still running. Failures are logged, never returned.
    pub async fn cleanup_expired(&self, keep_id: &str) -> Vec<String> {
        let records = match self.store.list_all().await {
            Ok(listing) => listing.records,
            Err(e) => {
                warn!("Retention cleanup skipped, could not list backups: {}", e);
                return Vec::new();
            }
        };

        let Some(cutoff) = retention::cutoff(Utc::now(), self.config.retention_days) else {
            debug!(
                "Retention window of {} days is unbounded, nothing to purge",
                self.config.retention_days
            );
            return Vec::new();
        };
        retention::purge(&self.store, &records, cutoff, |r| {
            r.id == keep_id || self.admission.is_active(&r.id)
        })
        .await
    }

    /// Fail records left in `in_progress` by a job that is no longer running
    /// (for example after a crash). Returns the records that were updated.
    pub async fn recover_interrupted(&self) -> Result<Vec<BackupRecord>> {
        let mut recovered = Vec::new();

        for mut record in self.store.list_all().await?.records {
            if record.status != BackupStatus::InProgress || self.admission.is_active(&record.id) {
                continue;
            }

            let duration = record.duration_millis;
            record.fail(INTERRUPTED_ERROR, duration);
            self.store.save(&record).await?;
            warn!(backup_id = %record.id, "Marked interrupted backup as failed");
            recovered.push(record);
        }

        Ok(recovered)
    }
}

async fn discard_partial_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Removed partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial artifact {}: {}", path.display(), e),
    }
}
