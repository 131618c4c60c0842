//! Error taxonomy for service operations.

use crate::ids::EventId;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Failures surfaced to callers of the attendance core.
///
/// "Already joined" and "not attending" are not errors; they are outcomes of
/// [`crate::JoinOutcome`] and [`crate::LeaveOutcome`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed or missing input. Not retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing, invalid or expired identity. Caller must re-authenticate.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid identity without ownership. Never retried.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The referenced event does not exist.
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// Transient storage failure or timeout. Callers may retry with backoff.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Non-transient storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Whether a caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            RepositoryError::Unavailable(msg) => Self::Unavailable(msg),
            RepositoryError::Database(msg) | RepositoryError::Serialization(msg) => {
                Self::Storage(msg)
            }
        }
    }
}
