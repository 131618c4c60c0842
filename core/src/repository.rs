//! Event repository trait and related types.
//!
//! The repository owns the attendee set. Membership only ever changes through
//! [`EventRepository::add_attendee`] and [`EventRepository::remove_attendee`],
//! each of which is a single atomic set mutation in storage. Callers never
//! read the whole event, modify the attendee list and write it back.
//!
//! # Implementations
//!
//! - `PostgresEventRepository` (in `rally-postgres`): production storage
//! - `InMemoryEventRepository` (in `rally-testing`): fast, deterministic tests

use crate::ids::{EventId, UserId};
use crate::model::{Event, EventPatch};
use crate::query::EventQuery;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No event with this identifier.
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// Transient failure: timeout, pool exhaustion, connection loss.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Query or constraint failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back into the model.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result of an atomic membership operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    /// The event after the operation
    pub event: Event,
    /// Whether this call altered the attendee set
    pub changed: bool,
}

/// Boxed future returned by repository operations.
pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Durable storage for events.
///
/// # Dyn Compatibility
///
/// Methods return explicit boxed futures so the repository can be shared as
/// `Arc<dyn EventRepository>`.
pub trait EventRepository: Send + Sync {
    /// Persist a new event and return its identifier.
    ///
    /// # Errors
    ///
    /// - `Database`: the insert failed (e.g. duplicate identifier)
    /// - `Unavailable`: storage could not be reached
    fn create(&self, event: Event) -> RepositoryFuture<'_, EventId>;

    /// Load one event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no event with this identifier
    fn find_by_id(&self, id: EventId) -> RepositoryFuture<'_, Event>;

    /// Load every event matching `query`, ordered by its sort order.
    ///
    /// `now` anchors the upcoming/past window.
    ///
    /// # Errors
    ///
    /// Storage failures only; an empty result is not an error.
    fn find_all(&self, query: EventQuery, now: DateTime<Utc>) -> RepositoryFuture<'_, Vec<Event>>;

    /// Overwrite exactly the fields present in `patch` and return the event.
    ///
    /// Owner and attendees are never touched.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no event with this identifier
    fn replace_fields(
        &self,
        id: EventId,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> RepositoryFuture<'_, Event>;

    /// Delete an event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no event with this identifier
    fn delete(&self, id: EventId) -> RepositoryFuture<'_, ()>;

    /// Atomically add `user_id` to the attendee set. No-op if present.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no event with this identifier
    fn add_attendee(&self, id: EventId, user_id: UserId) -> RepositoryFuture<'_, MembershipChange>;

    /// Atomically remove `user_id` from the attendee set. No-op if absent.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no event with this identifier
    fn remove_attendee(
        &self,
        id: EventId,
        user_id: UserId,
    ) -> RepositoryFuture<'_, MembershipChange>;
}

/// Run a repository future under a deadline.
///
/// Elapsed deadlines become [`RepositoryError::Unavailable`]. The call's
/// duration is recorded in `rally_repository_duration_seconds`.
///
/// # Errors
///
/// Returns the inner error, or `Unavailable` on timeout.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                "Repository call timed out"
            );
            Err(RepositoryError::Unavailable(format!(
                "{operation} timed out after {limit:?}"
            )))
        }
    };

    metrics::histogram!("rally_repository_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_unavailable() {
        let result: Result<(), RepositoryError> = with_timeout(
            "find_by_id",
            Duration::from_millis(50),
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_timeout_passes_through_inner_result() {
        let id = EventId::new();
        let result: Result<(), RepositoryError> =
            with_timeout("delete", Duration::from_secs(1), async move {
                Err(RepositoryError::NotFound(id))
            })
            .await;

        assert_eq!(result, Err(RepositoryError::NotFound(id)));
    }
}
