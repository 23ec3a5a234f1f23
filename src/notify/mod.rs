//! Notification transport seam and fire-and-forget fan-out.

mod telegram;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

pub use telegram::TelegramNotifier;

/// Errors raised by a notification transport. Always isolated per call
/// site: a failed send is logged and never aborts the sending job.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NotifyError {
    /// Raised when the transport client cannot be constructed.
    #[error("failed to construct notification client: {message}")]
    Client {
        /// Error message from the underlying client builder.
        message: String,
    },
    /// Raised on any I/O failure while delivering a message.
    #[error("notification transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// Raised when the API accepted the request but rejected the message.
    #[error("notification rejected: {description}")]
    Rejected {
        /// Description returned by the API.
        description: String,
    },
}

/// Future returned by [`Notifier::send`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Capability to deliver one formatted message to one destination.
pub trait Notifier: Send + Sync {
    /// Sends `text` to `chat_id` without raising a client-side alert.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] on delivery failures and
    /// [`NotifyError::Rejected`] when the API refuses the message.
    fn send<'a>(&'a self, chat_id: i64, text: &'a str) -> NotifyFuture<'a>;
}

/// Destination set attached to one job. May be empty; the job then emits
/// nothing but still runs.
#[derive(Clone)]
pub struct NotificationTargets {
    /// Transport used for every destination.
    pub notifier: Arc<dyn Notifier>,
    /// Chat ids to fan out to.
    pub chat_ids: Vec<i64>,
}

impl NotificationTargets {
    /// Dispatches `text` to every destination as an independent task.
    ///
    /// Sends are fire-and-forget: nothing awaits them, a slow or failing
    /// destination never delays the caller or the other destinations, and
    /// failures are only observable in the log.
    pub fn dispatch(&self, text: &str, job: &'static str) {
        for chat_id in &self.chat_ids {
            let notifier = Arc::clone(&self.notifier);
            let message = text.to_owned();
            let destination = *chat_id;
            tokio::spawn(async move {
                if let Err(err) = notifier.send(destination, &message).await {
                    error!(job, chat_id = destination, error = %err, "failed to send notification");
                }
            });
        }
    }
}
