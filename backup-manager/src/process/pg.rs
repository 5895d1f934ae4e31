//! PostgreSQL client tools (`pg_dump` / `pg_restore`) as child processes.

use super::command::{dump_command, restore_command, CommandSpec, DumpOptions};
use super::DatabaseTool;
use crate::config::{Config, DatabaseConfig, ToolsConfig};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest stderr excerpt carried into an error message
const MAX_STDERR_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct PgTool {
    database: DatabaseConfig,
    tools: ToolsConfig,
    options: DumpOptions,
    timeout: Option<Duration>,
}

impl PgTool {
    pub fn new(
        database: DatabaseConfig,
        tools: ToolsConfig,
        options: DumpOptions,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            database,
            tools,
            options,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.database.clone(),
            config.tools.clone(),
            DumpOptions::from(&config.backup),
            config.backup.timeout(),
        )
    }
}

#[async_trait]
impl DatabaseTool for PgTool {
    async fn dump(
        &self,
        artifact: &Path,
        tables: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let spec = dump_command(
            &self.tools.dump_program,
            &self.database,
            &self.options,
            artifact,
            tables,
        );
        info!("Starting dump of {} to {}", self.database.name, artifact.display());
        run(&spec, self.timeout, cancel).await
    }

    async fn restore(&self, artifact: &Path, cancel: &CancellationToken) -> Result<()> {
        let spec = restore_command(&self.tools.restore_program, &self.database, artifact);
        info!("Starting restore of {} from {}", self.database.name, artifact.display());
        run(&spec, self.timeout, cancel).await
    }
}

/// Run a child to completion. The child is killed if the deadline passes or
/// `cancel` fires first.
pub async fn run(
    spec: &CommandSpec,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<()> {
    let program = spec.program_name();
    debug!(?spec, "Spawning child process");

    let child = spec
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BackupError::BackupExecution(format!("failed to spawn {}: {}", program, e)))?;

    let wait = async move {
        match deadline {
            Some(d) => match tokio::time::timeout(d, child.wait_with_output()).await {
                Ok(output) => output.map_err(BackupError::from),
                Err(_) => Err(BackupError::Timeout(d)),
            },
            None => child.wait_with_output().await.map_err(BackupError::from),
        }
    };

    // Dropping `wait` drops the child, which kills it
    let output = tokio::select! {
        result = wait => result?,
        _ = cancel.cancelled() => {
            warn!("{} cancelled, killing child process", program);
            return Err(BackupError::Cancelled);
        }
    };

    if output.status.success() {
        debug!("{} finished successfully", program);
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
    Err(BackupError::BackupExecution(if stderr.is_empty() {
        format!("{} exited with {}", program, output.status)
    } else {
        format!("{} exited with {}: {}", program, output.status, stderr)
    }))
}
