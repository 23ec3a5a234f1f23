//! Binary entry point for the Varta backup scheduler.
//!
//! Loads configuration from the environment, wires the scheduler to the
//! backup and inventory jobs, and runs until a shutdown signal arrives.

use std::process;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use varta::config::Settings;
use varta::jobs::{BackupJob, InfoJob, Job};
use varta::kube::{KubeExecutor, RemoteExecutor};
use varta::notify::{NotificationTargets, Notifier, TelegramNotifier};
use varta::scheduler::Scheduler;
use varta::storage::{ObjectStorage, S3Storage};

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cluster client error: {0}")]
    Kube(String),
    #[error("notifier error: {0}")]
    Notify(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("schedule error: {0}")]
    Schedule(String),
    #[error("signal handler error: {0}")]
    Signal(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        tracing::error!(error = %err, "startup failed");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), AppError> {
    let settings = Settings::load().map_err(|err| AppError::Config(err.to_string()))?;
    let timezone = settings
        .timezone()
        .map_err(|err| AppError::Config(err.to_string()))?;

    let executor: Arc<dyn RemoteExecutor> = Arc::new(
        KubeExecutor::new(&settings.kubernetes).map_err(|err| AppError::Kube(err.to_string()))?,
    );

    let notifier: Option<Arc<dyn Notifier>> = if settings.telegram.notifications_enabled() {
        let telegram = TelegramNotifier::new(&settings.telegram)
            .map_err(|err| AppError::Notify(err.to_string()))?;
        Some(Arc::new(telegram))
    } else {
        None
    };

    let mut scheduler = Scheduler::new(timezone);

    let backup_targets = targets_for(
        notifier.as_ref(),
        settings.telegram.backup_notification_enabled,
        settings
            .telegram
            .backup_chat_ids()
            .map_err(|err| AppError::Config(err.to_string()))?,
    );
    let backup_job: Arc<dyn Job> = Arc::new(BackupJob::new(
        Arc::clone(&executor),
        backup_targets,
        settings.kubernetes.namespace.clone(),
        settings.exec.backup.clone(),
        timezone,
    ));
    scheduler
        .add_entry(backup_job.name(), &settings.cron.backup, backup_job)
        .map_err(|err| AppError::Schedule(err.to_string()))?;

    if settings.info_job_required() {
        let cadence = settings
            .cron
            .info
            .clone()
            .ok_or_else(|| AppError::Config(String::from("info cadence is not configured")))?;
        let storage: Option<Arc<dyn ObjectStorage>> = if settings.app.save_logs {
            let s3 = S3Storage::new(&settings.file_storage)
                .map_err(|err| AppError::Storage(err.to_string()))?;
            Some(Arc::new(s3))
        } else {
            None
        };
        let info_targets = targets_for(
            notifier.as_ref(),
            settings.telegram.info_notification_enabled,
            settings
                .telegram
                .info_chat_ids()
                .map_err(|err| AppError::Config(err.to_string()))?,
        );
        let info_job: Arc<dyn Job> = Arc::new(InfoJob::new(
            Arc::clone(&executor),
            info_targets,
            storage,
            settings.exec.info.clone(),
            timezone,
        ));
        scheduler
            .add_entry(info_job.name(), &cadence, info_job)
            .map_err(|err| AppError::Schedule(err.to_string()))?;
    }

    let handle = scheduler.start();
    tracing::info!("scheduler started, waiting for shutdown signal");

    wait_for_shutdown().await?;
    tracing::info!("shutdown signal received, draining in-flight runs");
    handle.stop().await;
    tracing::info!("scheduler stopped");
    Ok(())
}

fn targets_for(
    notifier: Option<&Arc<dyn Notifier>>,
    enabled: bool,
    chat_ids: Vec<i64>,
) -> Option<NotificationTargets> {
    if !enabled {
        return None;
    }
    notifier.map(|transport| NotificationTargets {
        notifier: Arc::clone(transport),
        chat_ids,
    })
}

async fn wait_for_shutdown() -> Result<(), AppError> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|err| AppError::Signal(err.to_string()))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| AppError::Signal(err.to_string()))
        }
        _ = terminate.recv() => Ok(()),
    }
}
