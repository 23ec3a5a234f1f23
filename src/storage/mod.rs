//! Object storage seam for archiving parsed inventories.

mod s3;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use s3::S3Storage;

/// One artifact to upload. Constructed once per info run when the full-only
/// inventory is non-empty, discarded after upload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadInput {
    /// Object key, including the timestamped path.
    pub name: String,
    /// MIME type recorded on the stored object.
    pub content_type: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Payload bytes.
    pub bytes: Vec<u8>,
}

impl UploadInput {
    /// Builds an upload input, deriving the size from the payload.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
            bytes,
        }
    }
}

/// Errors raised by a storage provider. Logged only; an upload failure
/// never fails the job that attempted it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised when the provider configuration is incomplete or malformed.
    #[error("storage configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
    /// Raised when the artifact payload cannot be produced.
    #[error("failed to encode artifact payload: {message}")]
    Payload {
        /// Description of the encoding failure.
        message: String,
    },
    /// Raised when request signing fails.
    #[error("failed to sign storage request: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },
    /// Raised on any I/O failure while uploading.
    #[error("storage transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// Raised when the storage endpoint refuses the upload.
    #[error("storage rejected upload with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, useful for diagnosing signature mismatches.
        body: String,
    },
}

/// Future returned by [`ObjectStorage::upload`].
pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + 'a>>;

/// Capability to persist one artifact, returning a locator for the stored
/// object.
pub trait ObjectStorage: Send + Sync {
    /// Uploads `input` and returns a `<bucket>://<name>` locator.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] on delivery failures and
    /// [`StorageError::Rejected`] when the endpoint refuses the object.
    fn upload<'a>(&'a self, input: &'a UploadInput) -> UploadFuture<'a>;
}
