use reqsave_archive::ArchiveError;
use reqsave_store::StoreError;

/// Errors returned by a [`crate::RequestSaver`].
#[derive(Debug, thiserror::Error)]
pub enum SaverError {
    /// The admission guard rejected the request. Nothing was written.
    #[error("too many requests")]
    TooManyRequests,

    /// The request could not be serialized. The sink was not invoked.
    #[error("serialization failed: {0}")]
    Serialization(#[from] ArchiveError),

    /// The sink failed to persist the blob.
    #[error("sink failed: {0}")]
    Store(#[from] StoreError),

    /// A mutual-exclusion decorator's lock was poisoned by a panicking save.
    #[error("saver lock poisoned")]
    Poisoned,

    /// A composed step failed.
    #[error("step '{step}' failed: {message}")]
    Step { step: String, message: String },
}

impl SaverError {
    /// Create a step error with a name and message.
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for the admission sentinel.
    pub fn is_too_many(&self) -> bool {
        matches!(self, Self::TooManyRequests)
    }
}

/// Result alias for saver operations.
pub type SaveResult<T> = Result<T, SaverError>;
