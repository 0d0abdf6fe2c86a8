//! Error types for the synchronization core.

use leaguesync_codec::CodecError;
use leaguesync_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the synchronization core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Document or blob storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A batch commit kept failing until the retry budget ran out.
    #[error("commit abandoned after {attempts} attempts: {message}")]
    CommitAbandoned {
        /// Number of attempts made.
        attempts: u32,
        /// Last error seen.
        message: String,
    },

    /// An event could not be stored as given.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A listener reported failure.
    #[error("listener failed: {0}")]
    Listener(String),

    /// Computing a view from its source failed.
    #[error("view {view} failed: {message}")]
    ViewFailed {
        /// View name.
        view: String,
        /// Error message.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid event error.
    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent(message.into())
    }

    /// Creates a listener error.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }

    /// Creates a view failure.
    pub fn view_failed(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ViewFailed {
            view: view.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_retry_classification() {
        let err: CoreError = StorageError::Unavailable("down".into()).into();
        assert!(err.is_retryable());
        let err: CoreError = StorageError::not_found("a/b").into();
        assert!(!err.is_retryable());
        assert!(!CoreError::invalid_event("no id").is_retryable());
    }

    #[test]
    fn abandoned_commit_display() {
        let err = CoreError::CommitAbandoned {
            attempts: 10,
            message: "store unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "commit abandoned after 10 attempts: store unavailable"
        );
    }
}
