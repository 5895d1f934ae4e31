//! In-process stand-in for the dump/restore tools.

use super::DatabaseTool;
use crate::models::BackupRecord;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct FakeTool {
    pub dumps: AtomicUsize,
    pub restores: AtomicUsize,
    pub fail_dump: bool,
    pub skip_artifact: bool,
    /// When set, each dump waits for a permit before writing
    pub gate: Option<Arc<Semaphore>>,
    /// Metadata status observed at the moment each dump started
    pub observed: Mutex<Vec<Option<BackupRecord>>>,
    pub tables_seen: Mutex<Vec<Option<Vec<String>>>>,
    pub restored: Mutex<Vec<PathBuf>>,
}

impl FakeTool {
    pub fn dump_count(&self) -> usize {
        self.dumps.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

fn metadata_for(artifact: &Path) -> Option<BackupRecord> {
    let id = artifact.file_stem()?.to_str()?;
    let path = artifact.parent()?.join("metadata").join(format!("{id}.json"));
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[async_trait]
impl DatabaseTool for FakeTool {
    async fn dump(
        &self,
        artifact: &Path,
        tables: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let n = self.dumps.fetch_add(1, Ordering::SeqCst);
        self.observed.lock().unwrap().push(metadata_for(artifact));
        self.tables_seen.lock().unwrap().push(tables.map(|t| t.to_vec()));

        if let Some(gate) = &self.gate {
            tokio::select! {
                permit = gate.acquire() => drop(permit),
                _ = cancel.cancelled() => return Err(BackupError::Cancelled),
            }
        }

        if self.fail_dump {
            tokio::fs::write(artifact, b"partial").await?;
            return Err(BackupError::BackupExecution(
                "pg_dump exited with exit status: 1: connection refused".to_string(),
            ));
        }
        if !self.skip_artifact {
            tokio::fs::write(artifact, format!("dump #{n}")).await?;
        }
        Ok(())
    }

    async fn restore(&self, artifact: &Path, _cancel: &CancellationToken) -> Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.restored.lock().unwrap().push(artifact.to_path_buf());
        Ok(())
    }
}
