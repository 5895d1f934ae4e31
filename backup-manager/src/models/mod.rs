//! Data model for backup records.

pub mod record;

pub use record::{generate_backup_id, is_valid_backup_id, BackupRecord, BackupStatus};
