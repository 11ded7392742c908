//! Error types for tree mutations.
//!
//! [`TreeError`] is what `copy`/`move` surface to the protocol layer.
//! [`ErrorCategory`] is the intermediate classification a protocol layer maps
//! onto its own wire representation (HTTP status codes for WebDAV).

use crate::backend::BackendError;
use thiserror::Error;

/// Errors surfaced by the registry and the tree mutator.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A source, destination parent or intermediate path does not resolve.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// The destination parent resolved to a file.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The backend refused because the destination exists and the overwrite
    /// policy is fail-on-conflict.
    #[error("Destination already exists: {0}")]
    Conflict(String),

    /// The path cannot name an entry (root, `..`, empty leaf).
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Transport or API failure reported by the backend (boxed to reduce enum size).
    #[error("Backend call failed: {0}")]
    Backend(Box<BackendError>),

    /// The backend reply is missing structure that was expected.
    #[error("Unexpected backend reply: {0}")]
    InvalidState(String),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Semantic category of a [`TreeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Resource not found.
    NotFound,
    /// Destination exists and overwriting was not allowed.
    AlreadyExists,
    /// Expected a directory but got a file.
    NotDirectory,
    /// Invalid path or argument.
    InvalidArgument,
    /// Backend transport/API failure.
    Backend,
}

impl ErrorCategory {
    /// Returns a human-readable name for this error category.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::NotDirectory => "NotDirectory",
            Self::InvalidArgument => "InvalidArgument",
            Self::Backend => "Backend",
        }
    }
}

impl TreeError {
    /// Classify a backend failure for the entry at `path`.
    ///
    /// Conflicts and missing objects keep their meaning; everything else is
    /// surfaced as [`TreeError::Backend`] verbatim.
    pub fn from_backend(err: BackendError, path: &str) -> Self {
        match err {
            BackendError::Conflict { .. } => TreeError::Conflict(path.to_string()),
            BackendError::NotFound { .. } => TreeError::NotFound(path.to_string()),
            other => TreeError::Backend(Box::new(other)),
        }
    }

    /// Returns the semantic category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TreeError::NotFound(_) => ErrorCategory::NotFound,
            TreeError::NotADirectory(_) => ErrorCategory::NotDirectory,
            TreeError::Conflict(_) => ErrorCategory::AlreadyExists,
            TreeError::InvalidPath(_) => ErrorCategory::InvalidArgument,
            TreeError::Backend(_) | TreeError::InvalidState(_) => ErrorCategory::Backend,
        }
    }
}

impl From<BackendError> for TreeError {
    fn from(e: BackendError) -> Self {
        TreeError::Backend(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_backend_keeps_conflict_and_not_found() {
        let err = TreeError::from_backend(
            BackendError::Conflict {
                name: "a.txt".to_string(),
            },
            "/dst/a.txt",
        );
        assert!(matches!(err, TreeError::Conflict(ref p) if p == "/dst/a.txt"));

        let err = TreeError::from_backend(
            BackendError::NotFound {
                real_path: "/x".to_string(),
            },
            "/src/a.txt",
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_backend_wraps_transport() {
        let err = TreeError::from_backend(
            BackendError::Transport("connection reset".to_string()),
            "/a",
        );
        assert!(matches!(err, TreeError::Backend(_)));
        assert_eq!(err.category(), ErrorCategory::Backend);
        assert_eq!(err.to_string(), "Backend call failed: Transport error: connection reset");
    }
}
