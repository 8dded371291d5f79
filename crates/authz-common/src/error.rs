//! Error types for OpenAuthz

use thiserror::Error;

/// Engine error type
///
/// All four kinds are terminal: the engine never retries a failed
/// uniqueness check or a denied resolution. Messages carry the id, code,
/// or name of the record involved so callers can render them directly.
#[derive(Error, Debug, Clone)]
pub enum AuthzError {
    /// Referenced record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness invariant violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Resolved access denied
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation attempted against an object in a state that disallows it
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthzError {
    /// Classify for programmatic handling
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Error kind without the message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing record
    NotFound,
    /// Uniqueness violation
    Conflict,
    /// Access denied
    Forbidden,
    /// Invalid state for the operation
    BadRequest,
    /// Backend failure
    Storage,
}

impl From<crate::value_objects::DomainError> for AuthzError {
    fn from(err: crate::value_objects::DomainError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Result type for OpenAuthz
pub type AuthzResult<T> = Result<T, AuthzError>;
