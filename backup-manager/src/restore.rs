//! Restore coordinator.
//!
//! The restore process is never started for a record that is not
//! `completed`: restoring from a partial or failed artifact could corrupt the
//! live database.

use crate::fs::checksum::compute_checksum;
use crate::models::BackupRecord;
use crate::process::DatabaseTool;
use crate::store::MetadataStore;
use crate::utils::errors::{BackupError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct RestoreCoordinator {
    store: MetadataStore,
    tool: Arc<dyn DatabaseTool>,
    verify_checksum: bool,
    cancel_token: CancellationToken,
}

impl RestoreCoordinator {
    pub fn new(
        store: MetadataStore,
        tool: Arc<dyn DatabaseTool>,
        verify_checksum: bool,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            tool,
            verify_checksum,
            cancel_token,
        }
    }

    /// Look up a restorable record without touching the database.
    pub async fn resolve(&self, id: &str) -> Result<BackupRecord> {
        let record = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| BackupError::BackupNotFound(id.to_string()))?;

        if !record.is_restorable() {
            return Err(BackupError::BackupNotRestorable {
                id: record.id,
                status: record.status.to_string(),
            });
        }

        Ok(record)
    }

    pub async fn restore(&self, id: &str) -> Result<BackupRecord> {
        let record = self.resolve(id).await?;

        if self.verify_checksum {
            verify_integrity(&record).await?;
        }

        let started = Instant::now();
        info!(backup_id = %record.id, "Restoring database from {}", record.artifact_path.display());

        if let Err(e) = self.tool.restore(&record.artifact_path, &self.cancel_token).await {
            error!(backup_id = %record.id, "Restore failed: {}", e);
            return Err(e);
        }

        info!(
            backup_id = %record.id,
            "Restore completed in {}ms",
            started.elapsed().as_millis()
        );
        Ok(record)
    }
}

/// Recompute the artifact checksum and compare it with the stored one.
pub async fn verify_integrity(record: &BackupRecord) -> Result<()> {
    let expected = record.checksum.as_deref().ok_or_else(|| BackupError::BackupNotRestorable {
        id: record.id.clone(),
        status: record.status.to_string(),
    })?;

    let actual = compute_checksum(&record.artifact_path).await.map_err(|e| {
        BackupError::BackupExecution(format!(
            "artifact {} is unreadable: {}",
            record.artifact_path.display(),
            e
        ))
    })?;

    if actual != expected {
        return Err(BackupError::ChecksumMismatch {
            id: record.id.clone(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::checksum::checksum_bytes;
    use crate::models::BackupStatus;
    use crate::process::testing::FakeTool;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: MetadataStore,
        tool: Arc<FakeTool>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = MetadataStore::new(dir.path().join("metadata"));
            Self {
                dir,
                store,
                tool: Arc::new(FakeTool::default()),
            }
        }

        fn coordinator(&self, verify: bool) -> RestoreCoordinator {
            RestoreCoordinator::new(
                self.store.clone(),
                self.tool.clone(),
                verify,
                CancellationToken::new(),
            )
        }

        async fn seed(&self, id: &str, status: BackupStatus) -> BackupRecord {
            let artifact = self.dir.path().join(format!("{id}.dump"));
            let data = format!("contents of {id}");
            std::fs::write(&artifact, &data).unwrap();

            let mut record = BackupRecord::new(id.to_string(), artifact, None);
            match status {
                BackupStatus::Completed => {
                    record.complete(data.len() as u64, checksum_bytes(data.as_bytes()), 1);
                }
                BackupStatus::Failed => {
                    record.fail("pg_dump exited with exit status: 1", 1);
                }
                BackupStatus::InProgress => {}
            }
            self.store.save(&record).await.unwrap();
            record
        }
    }

    #[tokio::test]
    async fn test_restore_unknown_id() {
        let fx = Fixture::new();
        let err = fx.coordinator(true).restore("nonexistent-id").await.unwrap_err();
        assert!(matches!(err, BackupError::BackupNotFound(id) if id == "nonexistent-id"));
        assert_eq!(fx.tool.restore_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_rejects_incomplete_records() {
        let fx = Fixture::new();
        fx.seed("backup-failed", BackupStatus::Failed).await;
        fx.seed("backup-running", BackupStatus::InProgress).await;
        let coordinator = fx.coordinator(false);

        for (id, status) in [("backup-failed", "failed"), ("backup-running", "in_progress")] {
            let err = coordinator.restore(id).await.unwrap_err();
            assert!(
                matches!(&err, BackupError::BackupNotRestorable { status: s, .. } if s == status),
                "unexpected error for {id}: {err:?}"
            );
        }
        assert_eq!(fx.tool.restore_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_completed_backup() {
        let fx = Fixture::new();
        let record = fx.seed("backup-ok", BackupStatus::Completed).await;

        let restored = fx.coordinator(true).restore("backup-ok").await.unwrap();
        assert_eq!(restored.id, "backup-ok");
        assert_eq!(fx.tool.restore_count(), 1);
        assert_eq!(fx.tool.restored.lock().unwrap()[0], record.artifact_path);
    }

    #[tokio::test]
    async fn test_corrupted_artifact_is_not_restored() {
        let fx = Fixture::new();
        let record = fx.seed("backup-ok", BackupStatus::Completed).await;
        std::fs::write(&record.artifact_path, b"tampered").unwrap();

        let err = fx.coordinator(true).restore("backup-ok").await.unwrap_err();
        assert!(matches!(err, BackupError::ChecksumMismatch { .. }));
        assert_eq!(fx.tool.restore_count(), 0);

        // Without verification the restore goes ahead
        fx.coordinator(false).restore("backup-ok").await.unwrap();
        assert_eq!(fx.tool.restore_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_execution_error() {
        let fx = Fixture::new();
        let record = fx.seed("backup-ok", BackupStatus::Completed).await;
        std::fs::remove_file(&record.artifact_path).unwrap();

        let err = fx.coordinator(true).restore("backup-ok").await.unwrap_err();
        assert!(matches!(err, BackupError::BackupExecution(_)));
        assert_eq!(fx.tool.restore_count(), 0);
    }
}
