//! Retention policy: purge backups older than the retention window.
//!
//! Cleanup is best-effort. A failed deletion is logged and the record is
//! picked up again on the next pass.

use crate::models::BackupRecord;
use crate::store::MetadataStore;
use chrono::{DateTime, Duration, Utc};
use std::io;
use tracing::{info, warn};

/// Oldest timestamp still inside the window. `None` when the window reaches
/// past the representable date range, in which case nothing expires.
pub fn cutoff(now: DateTime<Utc>, retention_days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|window| now.checked_sub_signed(window))
}

pub fn is_expired(record: &BackupRecord, cutoff: DateTime<Utc>) -> bool {
    record.timestamp < cutoff
}

/// Records eligible for deletion, skipping any for which `protected` holds.
pub fn select_expired<'a>(
    records: &'a [BackupRecord],
    cutoff: DateTime<Utc>,
    protected: impl Fn(&BackupRecord) -> bool,
) -> Vec<&'a BackupRecord> {
    records
        .iter()
        .filter(|r| is_expired(r, cutoff) && !protected(*r))
        .collect()
}

/// Remove a backup's artifact and its metadata. Both deletions are attempted
/// even if the first fails. Returns true only when both succeeded (a file that
/// is already gone counts as success).
pub async fn remove_backup(store: &MetadataStore, record: &BackupRecord) -> bool {
    let mut ok = true;

    match tokio::fs::remove_file(&record.artifact_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(
                backup_id = %record.id,
                "Failed to delete artifact {}: {}",
                record.artifact_path.display(),
                e
            );
            ok = false;
        }
    }

    if let Err(e) = store.delete(&record.id).await {
        warn!(backup_id = %record.id, "Failed to delete metadata: {}", e);
        ok = false;
    }

    ok
}

/// Delete every expired record. Returns the ids that were fully removed.
pub async fn purge(
    store: &MetadataStore,
    records: &[BackupRecord],
    cutoff: DateTime<Utc>,
    protected: impl Fn(&BackupRecord) -> bool,
) -> Vec<String> {
    let mut removed = Vec::new();

    for record in select_expired(records, cutoff, protected) {
        if remove_backup(store, record).await {
            info!(backup_id = %record.id, "Removed expired backup from {}", record.timestamp);
            removed.push(record.id.clone());
        }
    }

    removed
}
