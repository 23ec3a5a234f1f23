//! Cron-driven job scheduler with per-entry overlap suppression.
//!
//! One driver task owns all timing: it computes the next fire instant per
//! entry in the configured timezone, sleeps until the earliest one, and
//! spawns due jobs onto a task tracker. A run that is still in flight when
//! its entry fires again is skipped, not queued.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::jobs::Job;

/// Error raised when a schedule entry cannot be registered.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScheduleError {
    /// Raised when a cron expression does not parse.
    #[error("invalid cron expression for entry '{id}': {message}")]
    Expression {
        /// Identifier of the rejected entry.
        id: String,
        /// Parser diagnostic.
        message: String,
    },
}

struct Entry {
    id: String,
    schedule: Schedule,
    job: Arc<dyn Job>,
    in_flight: Arc<AtomicBool>,
    next: Option<DateTime<Tz>>,
}

/// Releases an entry's overlap latch when the run finishes, however it
/// finishes.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Collects schedule entries, then runs them until stopped.
pub struct Scheduler {
    timezone: Tz,
    entries: Vec<Entry>,
}

impl Scheduler {
    /// Creates an empty scheduler evaluating cron expressions in `timezone`.
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            entries: Vec::new(),
        }
    }

    /// Registers a job under `id` with a seconds-resolution cron
    /// `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Expression`] when the expression does not
    /// parse.
    pub fn add_entry(
        &mut self,
        id: impl Into<String>,
        expression: &str,
        job: Arc<dyn Job>,
    ) -> Result<(), ScheduleError> {
        let entry_id = id.into();
        let schedule = Schedule::from_str(expression).map_err(|err| ScheduleError::Expression {
            id: entry_id.clone(),
            message: err.to_string(),
        })?;
        self.entries.push(Entry {
            id: entry_id,
            schedule,
            job,
            in_flight: Arc::new(AtomicBool::new(false)),
            next: None,
        });
        Ok(())
    }

    /// Starts the driver task and hands back the stop handle.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let driver = tokio::spawn(drive(
            self.timezone,
            self.entries,
            cancel.clone(),
            tracker.clone(),
        ));
        SchedulerHandle {
            cancel,
            tracker,
            driver,
        }
    }
}

/// Handle to a running scheduler. Dropping it without calling
/// [`SchedulerHandle::stop`] leaves the driver running.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tracker: TaskTracker,
    driver: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the timing loop and waits for in-flight runs to finish.
    ///
    /// No new runs start after this is called; runs already started are
    /// allowed to complete.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.driver.await {
            tracing::error!(error = %err, "scheduler driver ended abnormally");
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn drive(
    timezone: Tz,
    mut entries: Vec<Entry>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let start = Utc::now().with_timezone(&timezone);
    for entry in &mut entries {
        entry.next = entry.schedule.after(&start).next();
        match entry.next {
            Some(next) => {
                tracing::info!(entry = %entry.id, %next, "schedule entry armed");
            }
            None => {
                tracing::warn!(entry = %entry.id, "schedule entry has no upcoming fire time");
            }
        }
    }

    loop {
        let now = Utc::now().with_timezone(&timezone);
        for entry in &mut entries {
            if entry.next.is_some_and(|next| next <= now) {
                entry.next = entry.schedule.after(&now).next();
                fire(entry, &tracker);
            }
        }

        let Some(wake) = entries.iter().filter_map(|entry| entry.next).min() else {
            // Nothing left to fire; park until stopped.
            cancel.cancelled().await;
            return;
        };
        let delay = (wake - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

fn fire(entry: &Entry, tracker: &TaskTracker) {
    if entry.in_flight.swap(true, Ordering::AcqRel) {
        tracing::debug!(
            entry = %entry.id,
            job = entry.job.name(),
            "previous run still in flight, skipping this fire"
        );
        return;
    }
    let guard = FlightGuard(Arc::clone(&entry.in_flight));
    let job = Arc::clone(&entry.job);
    tracker.spawn(async move {
        let _released_on_exit = guard;
        job.run().await;
    });
}
