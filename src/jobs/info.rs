//! Inventory job: fetches the backup inventory from the remote pod,
//! reports the full backups, and archives them as a JSON artifact.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::kube::RemoteExecutor;
use crate::notify::NotificationTargets;
use crate::storage::{ObjectStorage, StorageError, UploadInput};

use super::records::BackupRecord;
use super::{INFO_JOB, Job, JobFuture, messages, records};

const ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";
const ARTIFACT_NAME_FORMAT: &str = "logs/%Y-%m-%d_%H-%M-%S.json";

/// Reports on the remote backup inventory.
///
/// Both the notification and the storage sides are optional; the job
/// still runs the remote command and logs the outcome when neither is
/// configured.
pub struct InfoJob {
    executor: Arc<dyn RemoteExecutor>,
    notifications: Option<NotificationTargets>,
    storage: Option<Arc<dyn ObjectStorage>>,
    command: String,
    timezone: Tz,
}

impl InfoJob {
    /// Builds an inventory job.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        notifications: Option<NotificationTargets>,
        storage: Option<Arc<dyn ObjectStorage>>,
        command: impl Into<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            executor,
            notifications,
            storage,
            command: command.into(),
            timezone,
        }
    }

    async fn run_once(&self) {
        tracing::info!(job = INFO_JOB, "starting inventory run");

        let stdout = match self.executor.exec(&self.command).await {
            Ok(stdout) => stdout,
            Err(err) => {
                tracing::error!(job = INFO_JOB, error = %err, "inventory command failed");
                return;
            }
        };

        let inventory = match records::parse_inventory(&stdout) {
            Ok(inventory) => inventory,
            Err(err) => {
                tracing::error!(job = INFO_JOB, error = %err, "inventory output is not valid JSON");
                return;
            }
        };

        let full_backups = records::full_only(&inventory);
        if full_backups.is_empty() {
            tracing::warn!(job = INFO_JOB, "inventory contains no full backups");
        }

        if let Some(targets) = &self.notifications {
            let text = messages::inventory(&full_backups, self.timezone);
            targets.dispatch(&text, INFO_JOB);
        }

        if !full_backups.is_empty() {
            if let Some(storage) = &self.storage {
                match self.persist(storage.as_ref(), &full_backups).await {
                    Ok(locator) => {
                        tracing::info!(job = INFO_JOB, %locator, "inventory artifact stored");
                    }
                    Err(err) => {
                        tracing::error!(job = INFO_JOB, error = %err, "failed to store inventory artifact");
                    }
                }
            }
        }

        tracing::info!(job = INFO_JOB, "inventory run finished");
    }

    async fn persist(
        &self,
        storage: &dyn ObjectStorage,
        full_backups: &[BackupRecord],
    ) -> Result<String, StorageError> {
        let bytes = serde_json::to_vec(full_backups).map_err(|err| StorageError::Payload {
            message: err.to_string(),
        })?;
        let name = chrono::Utc::now()
            .with_timezone(&self.timezone)
            .format(ARTIFACT_NAME_FORMAT)
            .to_string();
        let input = UploadInput::new(name, ARTIFACT_CONTENT_TYPE, bytes);
        storage.upload(&input).await
    }
}

impl Job for InfoJob {
    fn name(&self) -> &'static str {
        INFO_JOB
    }

    fn run(&self) -> JobFuture<'_> {
        Box::pin(self.run_once())
    }
}
