//! Error types for session verification.

use rally_core::VerifyError;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures of session storage and bearer token verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The bearer token is not a well-formed session identifier.
    #[error("Invalid session token")]
    InvalidToken,

    /// Session not found.
    #[error("Session not found")]
    SessionNotFound,

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// A session with this identifier already exists.
    #[error("Session already exists")]
    SessionExists,

    /// The session backend could not be reached.
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    /// Stored session bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for VerifyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::SessionNotFound => Self::Invalid,
            AuthError::SessionExpired => Self::Expired,
            AuthError::Unavailable(message) => Self::Unavailable(message),
            // A session we cannot read is not proof of anything.
            AuthError::SessionExists
            | AuthError::SerializationError(_)
            | AuthError::InternalError(_) => Self::Invalid,
        }
    }
}

impl From<bincode::Error> for AuthError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::InternalError(err.to_string())
        }
    }
}
