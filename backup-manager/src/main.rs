//! Backup Manager - command line entry point.

use anyhow::{bail, Result};
use backup_manager::{
    config::Config, daemon::shutdown::ShutdownCoordinator, utils, BackupError,
    BackupOrchestrator, BackupRecord, BackupRequest, BackupStatus,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump the database and record the backup
    Create {
        /// Only back up this table (repeatable)
        #[arg(long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },
    /// List backups, newest first
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore the database from a completed backup
    Restore { id: String },
    /// Check a backup's artifact against its recorded checksum
    Verify { id: String },
    /// Delete a backup's artifact and metadata
    Delete { id: String },
    /// Mark backups left in progress by a crashed run as failed
    Recover,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "backup-manager v{} (backup dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.backup.backup_dir.display()
    );

    let shutdown = ShutdownCoordinator::new();
    let orchestrator = BackupOrchestrator::from_config(&config, shutdown.token());

    // Signals cancel the running child; the command still finishes and
    // records the outcome
    let signals = tokio::spawn(async move { shutdown.wait_for_signal().await });
    let result = run(&orchestrator, args.command).await;
    signals.abort();

    // Bad requests (unknown id, limit reached, ...) exit with 2
    match result {
        Err(e) if is_request_error(&e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        other => other,
    }
}

async fn run(orchestrator: &BackupOrchestrator, command: Command) -> Result<()> {
    match command {
        Command::Create { tables } => {
            let record = orchestrator
                .create_backup_with(BackupRequest::tables(tables))
                .await?;
            print_record(&record);
            if record.status == BackupStatus::Failed {
                bail!(
                    "backup {} failed: {}",
                    record.id,
                    record.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Command::List { json } => {
            let records = orchestrator.list_backups().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No backups found in {}", orchestrator.config().backup_dir.display());
            } else {
                for record in &records {
                    print_record(record);
                }
            }
        }
        Command::Restore { id } => {
            let record = orchestrator.restore_from_backup(&id).await?;
            println!("Restored database from {} ({})", record.id, record.timestamp.to_rfc3339());
        }
        Command::Verify { id } => {
            if orchestrator.verify_backup(&id).await? {
                println!("{}: checksum OK", id);
            } else {
                bail!("{}: verification failed", id);
            }
        }
        Command::Delete { id } => {
            orchestrator.delete_backup(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Recover => {
            let recovered = orchestrator.recover_interrupted().await?;
            println!("Marked {} interrupted backup(s) as failed", recovered.len());
            for record in &recovered {
                print_record(record);
            }
        }
    }

    Ok(())
}

fn print_record(record: &BackupRecord) {
    let size = record
        .size_bytes
        .map(format_size)
        .unwrap_or_else(|| "-".to_string());
    let checksum = record
        .checksum
        .as_deref()
        .map(short_checksum)
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{}  {}  {:<11}  {:>10}  {:>7}ms  {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.status,
        size,
        record.duration_millis,
        checksum
    );
    if let Some(error) = &record.error {
        println!("    error: {}", error);
    }
}

fn is_request_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<BackupError>()
        .is_some_and(BackupError::is_request_error)
}

/// First 12 characters; metadata files can be hand-edited, so not always hex
fn short_checksum(checksum: &str) -> String {
    checksum.chars().take(12).collect()
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
