//! Core library for the Varta backup scheduler.
//!
//! The crate wires a cron-driven scheduler to two jobs that act on a
//! remote container in a Kubernetes cluster: one triggers the backup
//! command, the other collects the backup inventory, notifies Telegram
//! chats, and archives the full-backup list to S3-compatible storage.

pub mod config;
pub mod jobs;
pub mod kube;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod test_support;

pub use config::{ConfigError, Settings};
pub use jobs::{BackupJob, InfoJob, Job};
pub use kube::{KubeError, KubeExecutor, RemoteExecutor};
pub use notify::{NotificationTargets, Notifier, NotifyError, TelegramNotifier};
pub use scheduler::{ScheduleError, Scheduler, SchedulerHandle};
pub use storage::{ObjectStorage, S3Storage, StorageError, UploadInput};
