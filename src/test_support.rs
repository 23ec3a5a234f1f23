//! Scriptable fakes for the crate's trait seams.
//!
//! Used by the job and scheduler tests to drive runs without a cluster,
//! a Telegram endpoint, or an object store.

use std::sync::{Arc, Mutex};

use crate::kube::{ExecFuture, KubeError, RemoteExecutor};
use crate::notify::{Notifier, NotifyError, NotifyFuture};
use crate::storage::{ObjectStorage, StorageError, UploadFuture, UploadInput};

/// Remote executor that replays a queue of scripted outcomes.
///
/// Each call to `exec` pops the next outcome; an exhausted queue raises a
/// transport error so a test that over-runs its script fails loudly.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<Vec<Result<String, KubeError>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    /// Builds an executor that replays `outcomes` in order.
    #[must_use]
    pub fn new(outcomes: Vec<Result<String, KubeError>>) -> Self {
        let mut queue = outcomes;
        queue.reverse();
        Self {
            outcomes: Mutex::new(queue),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Commands received so far, in call order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        match self.commands.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RemoteExecutor for ScriptedExecutor {
    fn exec<'a>(&'a self, command: &'a str) -> ExecFuture<'a> {
        Box::pin(async move {
            if let Ok(mut commands) = self.commands.lock() {
                commands.push(command.to_owned());
            }
            let next = self.outcomes.lock().ok().and_then(|mut queue| queue.pop());
            next.unwrap_or_else(|| {
                Err(KubeError::Transport {
                    message: String::from("scripted executor exhausted"),
                })
            })
        })
    }
}

/// Notifier that records every message it is asked to deliver.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
}

impl RecordingNotifier {
    /// Builds a notifier with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far as `(chat_id, text)` pairs.
    #[must_use]
    pub fn sent(&self) -> Vec<(i64, String)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(&'a self, chat_id: i64, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((chat_id, text.to_owned()));
            }
            Ok(())
        })
    }
}

/// Notifier that refuses every message.
#[derive(Clone, Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send<'a>(&'a self, _chat_id: i64, _text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async {
            Err(NotifyError::Rejected {
                description: String::from("scripted rejection"),
            })
        })
    }
}

/// Storage provider that records uploads instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct RecordingStorage {
    uploads: Arc<Mutex<Vec<UploadInput>>>,
    fail: bool,
}

impl RecordingStorage {
    /// Builds a provider that accepts every upload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a provider that rejects every upload.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Uploads accepted so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<UploadInput> {
        match self.uploads.lock() {
            Ok(uploads) => uploads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ObjectStorage for RecordingStorage {
    fn upload<'a>(&'a self, input: &'a UploadInput) -> UploadFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(StorageError::Rejected {
                    status: 503,
                    body: String::from("scripted rejection"),
                });
            }
            if let Ok(mut uploads) = self.uploads.lock() {
                uploads.push(input.clone());
            }
            Ok(format!("test://{}", input.name))
        })
    }
}
