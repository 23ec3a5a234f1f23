//! Error types for the Kubernetes remote executor.

use thiserror::Error;

/// Errors raised while resolving an exec target or streaming a remote command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KubeError {
    /// Raised when the configured API endpoint cannot be parsed or rewritten.
    #[error("invalid Kubernetes API endpoint: {message}")]
    Endpoint {
        /// Description of the malformed endpoint.
        message: String,
    },
    /// Raised when the HTTP or TLS client cannot be constructed.
    #[error("failed to construct cluster client: {message}")]
    Client {
        /// Error message from the underlying client builder.
        message: String,
    },
    /// Raised when no pod matches the configured label selector.
    #[error("no pod matches label selector '{label_selector}' in namespace {namespace}")]
    PodNotFound {
        /// Namespace that was searched.
        namespace: String,
        /// Label selector used for the lookup.
        label_selector: String,
    },
    /// Raised when the named container is absent from the resolved pod.
    #[error("container '{container}' not found in pod {namespace}/{pod}")]
    ContainerNotFound {
        /// Container name that was requested.
        container: String,
        /// Namespace of the resolved pod.
        namespace: String,
        /// Name of the resolved pod.
        pod: String,
    },
    /// Raised on any I/O or protocol failure while talking to the cluster,
    /// including a `Failure` status reported on the exec error channel.
    #[error("remote exec transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },
    /// Raised when the remote command wrote to stderr. The wrapped backup
    /// tool logs progress there, so callers decide how severe this is.
    #[error("remote command wrote to stderr: {stderr}")]
    RemoteCommand {
        /// Captured stderr contents.
        stderr: String,
    },
}

impl From<reqwest::Error> for KubeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for KubeError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}
