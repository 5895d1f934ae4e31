//! Configuration management for the backup manager.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Every section is optional; missing values fall back to the defaults below.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub database: DatabaseConfig,
    pub tools: ToolsConfig,
    pub log: LogConfig,
}

/// Process-wide backup policy. Immutable once handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backups older than this many days are purged after each successful backup
    pub retention_days: u32,

    /// Root directory for artifacts; metadata lives in `<backup_dir>/metadata`
    pub backup_dir: PathBuf,

    /// Maximum number of backup jobs running at once
    pub max_concurrent_backups: usize,

    /// Archive compression level (0-9)
    pub compression_level: u8,

    /// true = schema only, false = data only
    pub include_schema: bool,

    /// Tables left out of every backup
    pub exclude_tables: Vec<String>,

    /// Kill the dump/restore process after this many seconds
    pub timeout_secs: Option<u64>,

    /// Recompute the artifact checksum before restoring
    pub verify_before_restore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,

    /// Handed to the child process through `PGPASSWORD`, never on the command line
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub dump_program: PathBuf,
    pub restore_program: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            backup_dir: PathBuf::from("./backups"),
            max_concurrent_backups: 1,
            compression_level: 6,
            include_schema: true,
            exclude_tables: vec!["audit_logs".to_string(), "activity_events".to_string()],
            timeout_secs: None,
            verify_before_restore: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dump_program: PathBuf::from("pg_dump"),
            restore_program: PathBuf::from("pg_restore"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BackupConfig {
    pub fn metadata_dir(&self) -> PathBuf {
        self.backup_dir.join("metadata")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BackupError::Config(e.to_string()))
    }

    /// Apply environment overrides (a `.env` file is honoured if present).
    pub fn with_env_overrides(mut self) -> Result<Self> {
        let _ = dotenvy::dotenv();

        if let Ok(dir) = std::env::var("BACKUP_DIR") {
            self.backup.backup_dir = PathBuf::from(dir);
        }
        if let Some(days) = env_parse("BACKUP_RETENTION_DAYS")? {
            self.backup.retention_days = days;
        }
        if let Some(max) = env_parse("BACKUP_MAX_CONCURRENT")? {
            self.backup.max_concurrent_backups = max;
        }
        if let Ok(host) = std::env::var("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = env_parse("DB_PORT")? {
            self.database.port = port;
        }
        if let Ok(name) = std::env::var("DB_NAME") {
            self.database.name = name;
        }
        if let Ok(user) = std::env::var("DB_USER") {
            self.database.user = user;
        }
        if let Ok(password) = std::env::var("DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log.level = level;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backup.compression_level > 9 {
            return Err(BackupError::Config(format!(
                "compression_level must be between 0 and 9, got {}",
                self.backup.compression_level
            )));
        }
        if self.backup.max_concurrent_backups == 0 {
            return Err(BackupError::Config(
                "max_concurrent_backups must be at least 1".to_string(),
            ));
        }
        if self.database.name.trim().is_empty() {
            return Err(BackupError::Config("database name must not be empty".to_string()));
        }
        if self.backup.exclude_tables.iter().any(|t| t.trim().is_empty()) {
            return Err(BackupError::Config(
                "exclude_tables must not contain empty names".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BackupError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(None),
    }
}
