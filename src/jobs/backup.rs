//! Backup job: announces a run, executes the remote backup command, then
//! announces completion.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::kube::RemoteExecutor;
use crate::notify::NotificationTargets;

use super::{BACKUP_JOB, Job, JobFuture, messages};

/// Runs the remote backup command and notifies its audience around it.
///
/// The start and end notifications share a run id so a reader can pair
/// them up, and the end notification is sent whether or not the command
/// succeeded.
pub struct BackupJob {
    executor: Arc<dyn RemoteExecutor>,
    notifications: Option<NotificationTargets>,
    namespace: String,
    command: String,
    timezone: Tz,
}

impl BackupJob {
    /// Builds a backup job.
    ///
    /// Pass `None` for `notifications` to run silently.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        notifications: Option<NotificationTargets>,
        namespace: impl Into<String>,
        command: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            executor,
            notifications,
            namespace: namespace.into(),
            command: command.into(),
            timezone,
        }
    }

    async fn run_once(&self) {
        let run_id = Uuid::new_v4();
        tracing::info!(job = BACKUP_JOB, %run_id, "starting backup run");

        if let Some(targets) = &self.notifications {
            let text = messages::backup_started(
                &self.namespace,
                &self.command,
                Utc::now(),
                self.timezone,
                run_id,
            );
            targets.dispatch(&text, BACKUP_JOB);
        }

        match self.executor.exec(&self.command).await {
            Ok(stdout) => {
                tracing::info!(job = BACKUP_JOB, %run_id, output = %stdout, "backup command finished");
            }
            Err(err) => {
                tracing::warn!(job = BACKUP_JOB, %run_id, error = %err, "backup command failed");
            }
        }

        if let Some(targets) = &self.notifications {
            let text =
                messages::backup_finished(&self.namespace, Utc::now(), self.timezone, run_id);
            targets.dispatch(&text, BACKUP_JOB);
        }

        tracing::info!(job = BACKUP_JOB, %run_id, "backup run finished");
    }
}

impl Job for BackupJob {
    fn name(&self) -> &'static str {
        BACKUP_JOB
    }

    fn run(&self) -> JobFuture<'_> {
        Box::pin(self.run_once())
    }
}
