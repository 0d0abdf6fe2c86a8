//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored document or payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] leaguesync_codec::CodecError),

    /// An update targeted a document that does not exist.
    #[error("document not found: {path}")]
    NotFound {
        /// Path of the missing document.
        path: String,
    },

    /// A path was malformed or escaped its root.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The store could not be reached; the operation may succeed later.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The persisted state is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Unavailable(_) => true,
            StorageError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(StorageError::Unavailable("down".into()).is_retryable());
        assert!(StorageError::Io(io::Error::from(io::ErrorKind::TimedOut)).is_retryable());
        assert!(!StorageError::Io(io::Error::from(io::ErrorKind::PermissionDenied)).is_retryable());
        assert!(!StorageError::not_found("a/b").is_retryable());
        assert!(!StorageError::Corrupted("bad".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = StorageError::not_found("league_data/1/TEAMS/7");
        assert_eq!(err.to_string(), "document not found: league_data/1/TEAMS/7");
    }
}
