//! Scheduled jobs: triggering remote backups and reporting on the backup
//! inventory.
//!
//! Jobs never return errors to the scheduler. Every failure is logged and
//! the run ends; the next scheduled fire starts from a clean slate.

mod backup;
mod info;
mod messages;
mod records;

use std::future::Future;
use std::pin::Pin;

pub use backup::BackupJob;
pub use info::InfoJob;
pub use records::{BackupRecord, InventoryError, full_only, parse_inventory};

/// Scheduler-facing name of the backup job.
pub const BACKUP_JOB: &str = "backup";
/// Scheduler-facing name of the inventory job.
pub const INFO_JOB: &str = "info";

/// Boxed future produced by one job run.
pub type JobFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A unit of scheduled work.
///
/// Implementations swallow their own failures: `run` resolves once the
/// attempt has finished, successfully or not.
pub trait Job: Send + Sync {
    /// Stable name used in schedule registration and log lines.
    fn name(&self) -> &'static str;

    /// Executes one run of the job.
    fn run(&self) -> JobFuture<'_>;
}

#[cfg(test)]
mod tests;
