//! Error handling and HTTP status mapping for the WebDAV front end.
//!
//! Tree failures are classified through the shared
//! [`ErrorCategory`](objdav_tree::ErrorCategory) and mapped onto status codes
//! here; request-level failures (bad headers, unsupported methods) are
//! specific to this crate.

use hyper::StatusCode;
use objdav_tree::{ErrorCategory, TreeError};
use std::io;
use thiserror::Error;

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// COPY or MOVE without a `Destination` header.
    #[error("Missing Destination header")]
    MissingDestination,

    /// `Destination` is not an absolute URI or absolute path.
    #[error("Invalid Destination header: {0}")]
    InvalidDestination(String),

    /// The request path could not be decoded.
    #[error("Invalid request path: {0}")]
    InvalidRequestPath(String),

    /// Method outside COPY, MOVE and OPTIONS.
    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    /// Socket failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// HTTP status sent to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Tree(e) => category_to_status(e.category()),
            ServerError::MissingDestination
            | ServerError::InvalidDestination(_)
            | ServerError::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            ServerError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Category label for log events.
    pub fn category_name(&self) -> &'static str {
        match self {
            ServerError::Tree(e) => e.category().name(),
            ServerError::Io(_) => "Io",
            _ => "Request",
        }
    }
}

/// WebDAV status for a tree error category.
///
/// A taken destination in fail mode is `412 Precondition Failed` (the
/// `Overwrite: F` precondition), a file used as destination parent is
/// `409 Conflict`.
pub fn category_to_status(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::AlreadyExists => StatusCode::PRECONDITION_FAILED,
        ErrorCategory::NotDirectory => StatusCode::CONFLICT,
        ErrorCategory::InvalidArgument => StatusCode::FORBIDDEN,
        ErrorCategory::Backend => StatusCode::BAD_GATEWAY,
    }
}

/// Result type for request handling.
pub type ServerResult<T> = Result<T, ServerError>;
