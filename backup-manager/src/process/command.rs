//! Argument-vector construction for the dump and restore executables.
//!
//! Commands are built as argv lists, never shell strings, so table names and
//! paths from configuration cannot inject shell syntax. The password is only
//! ever attached to the child's environment.

use crate::config::{BackupConfig, DatabaseConfig};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Environment variable the PostgreSQL client tools read the password from
pub const PASSWORD_ENV: &str = "PGPASSWORD";

/// Options controlling what a dump contains
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub compression_level: u8,
    pub include_schema: bool,
    pub exclude_tables: Vec<String>,
}

impl From<&BackupConfig> for DumpOptions {
    fn from(config: &BackupConfig) -> Self {
        Self {
            compression_level: config.compression_level,
            include_schema: config.include_schema,
            exclude_tables: config.exclude_tables.clone(),
        }
    }
}

/// A fully-resolved child process invocation
#[derive(Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Build the tokio command. Environment changes are scoped to this child.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

// Keeps the password out of logs
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .finish()
    }
}

fn connection_args(spec: &mut CommandSpec, db: &DatabaseConfig) {
    spec.arg(format!("--host={}", db.host))
        .arg(format!("--port={}", db.port))
        .arg(format!("--username={}", db.user))
        .arg(format!("--dbname={}", db.name))
        .arg("--no-password");

    if let Some(password) = &db.password {
        spec.env.push((PASSWORD_ENV.to_string(), password.clone()));
    }
}

/// `pg_dump` invocation writing a compressed custom-format archive to `artifact`.
pub fn dump_command(
    program: &Path,
    db: &DatabaseConfig,
    options: &DumpOptions,
    artifact: &Path,
    tables: Option<&[String]>,
) -> CommandSpec {
    let mut spec = CommandSpec::new(program);
    connection_args(&mut spec, db);

    spec.arg("--format=custom")
        .arg(format!("--compress={}", options.compression_level));

    let mut file_arg = OsString::from("--file=");
    file_arg.push(artifact.as_os_str());
    spec.arg(file_arg);

    if options.include_schema {
        spec.arg("--schema-only");
    } else {
        spec.arg("--data-only");
    }

    for table in tables.unwrap_or_default() {
        spec.arg(format!("--table={}", table));
    }
    for table in &options.exclude_tables {
        spec.arg(format!("--exclude-table={}", table));
    }

    spec
}

/// `pg_restore` invocation that drops existing objects before recreating them.
pub fn restore_command(program: &Path, db: &DatabaseConfig, artifact: &Path) -> CommandSpec {
    let mut spec = CommandSpec::new(program);
    connection_args(&mut spec, db);

    spec.arg("--clean").arg("--if-exists").arg(artifact.as_os_str());
    spec
}
