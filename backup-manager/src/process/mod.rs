//! External dump/restore process adapter.
//!
//! The orchestrator only talks to [`DatabaseTool`]; [`pg::PgTool`] is the
//! production implementation that shells out to the PostgreSQL client tools.

pub mod command;
pub mod pg;
#[cfg(test)]
pub(crate) mod testing;

use crate::utils::errors::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub use pg::PgTool;

#[async_trait]
pub trait DatabaseTool: Send + Sync {
    /// Write a dump of the database to `artifact`. `tables` restricts the dump
    /// to a subset when present.
    async fn dump(
        &self,
        artifact: &Path,
        tables: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Restore the database from `artifact`.
    async fn restore(&self, artifact: &Path, cancel: &CancellationToken) -> Result<()>;
}
