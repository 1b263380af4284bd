use thiserror::Error;

use crate::guard::GuardError;
use crate::locator::LocatorError;

/// Failures of one upload invocation. None of them change the persisted gate.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Media could not be located: {0}")]
    LocatorFailed(#[from] LocatorError),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Upload state unavailable: {0}")]
    State(#[from] GuardError),

    /// The object is stored, but the gate could not be closed.
    #[error("Upload of {key} succeeded but could not be recorded: {source}")]
    CompletionNotRecorded {
        key: String,
        #[source]
        source: GuardError,
    },
}

impl UploadError {
    /// Whether calling `upload` again may succeed without outside intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::TransferFailed(_))
    }
}
