//! Backup Manager Library
//!
//! Point-in-time, checksum-verified database backups with a file-based
//! catalog, retention cleanup and guarded restore.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod models;
pub mod process;
pub mod restore;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupOrchestrator, BackupRequest};
pub use models::{BackupRecord, BackupStatus};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
