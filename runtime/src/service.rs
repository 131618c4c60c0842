//! Event Service: the composition root of the attendance core.
//!
//! Every state-changing operation follows the same shape:
//!
//! 1. reject expired identities (`Unauthenticated`)
//! 2. apply the change through the [`AttendanceManager`]
//! 3. on a state-changing success, `notify(event_id)` exactly once
//!
//! No-op outcomes (`AlreadyJoined`, `NotAttending`) and errors never notify.
//! Reads are retried on `Unavailable`; writes are not.

use crate::metrics::AttendanceMetrics;
use crate::retry::{retry_with_predicate, RetryPolicy};
use rally_core::{
    AttendanceManager, Event, EventId, EventPatch, EventQuery, Identity, JoinOutcome,
    LeaveOutcome, NewEvent, Notifier, ServiceError,
};
use std::sync::Arc;
use tracing::instrument;

/// Orchestrates attendance changes and live-update notifications.
///
/// Cheap to clone; share one per process.
#[derive(Clone)]
pub struct EventService {
    attendance: AttendanceManager,
    notifier: Arc<dyn Notifier>,
    read_retry: RetryPolicy,
}

impl EventService {
    /// Create a service with the default read retry policy.
    #[must_use]
    pub fn new(attendance: AttendanceManager, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            attendance,
            notifier,
            read_retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for reads.
    #[must_use]
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// Create an event owned by the caller.
    ///
    /// Nobody is notified: no observer can be watching an event that did not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `Validation`, `Unavailable`, `Storage`.
    #[instrument(skip(self, identity, input), fields(user_id = %identity.user_id))]
    pub async fn create(&self, identity: &Identity, input: NewEvent) -> Result<Event, ServiceError> {
        self.require_fresh(identity)?;
        let event = self.attendance.create(identity, input).await?;

        AttendanceMetrics::record_mutation("create");
        tracing::info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    /// Load one event.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Unavailable` once retries are exhausted.
    #[instrument(skip(self))]
    pub async fn get(&self, event_id: EventId) -> Result<Event, ServiceError> {
        retry_with_predicate(
            &self.read_retry,
            || self.attendance.get(event_id),
            ServiceError::is_retryable,
        )
        .await
    }

    /// List events matching `query`.
    ///
    /// # Errors
    ///
    /// `Unavailable` once retries are exhausted, or `Storage`.
    #[instrument(skip(self))]
    pub async fn list(&self, query: EventQuery) -> Result<Vec<Event>, ServiceError> {
        retry_with_predicate(
            &self.read_retry,
            || self.attendance.list(query.clone()),
            ServiceError::is_retryable,
        )
        .await
    }

    /// Add the caller to the event's attendees.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `NotFound`, `Unavailable`, `Storage`.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn join(&self, event_id: EventId, identity: &Identity) -> Result<JoinOutcome, ServiceError> {
        self.require_fresh(identity)?;
        let outcome = self.attendance.join(event_id, identity.user_id).await?;

        AttendanceMetrics::record_join(&outcome);
        if outcome.changed() {
            self.notify(event_id);
        } else {
            tracing::debug!("User already attending");
        }
        Ok(outcome)
    }

    /// Remove the caller from the event's attendees.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `NotFound`, `Unavailable`, `Storage`.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn leave(&self, event_id: EventId, identity: &Identity) -> Result<LeaveOutcome, ServiceError> {
        self.require_fresh(identity)?;
        let outcome = self.attendance.leave(event_id, identity.user_id).await?;

        AttendanceMetrics::record_leave(&outcome);
        if outcome.changed() {
            self.notify(event_id);
        } else {
            tracing::debug!("User was not attending");
        }
        Ok(outcome)
    }

    /// Apply the owner's partial update.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `Validation`, `Forbidden`, `NotFound`,
    /// `Unavailable`, `Storage`.
    #[instrument(skip(self, identity, patch), fields(user_id = %identity.user_id))]
    pub async fn mutate(
        &self,
        event_id: EventId,
        identity: &Identity,
        patch: EventPatch,
    ) -> Result<Event, ServiceError> {
        self.require_fresh(identity)?;
        let event = self.attendance.mutate(event_id, identity, patch).await?;

        AttendanceMetrics::record_mutation("update");
        self.notify(event_id);
        Ok(event)
    }

    /// Delete the event on behalf of its owner.
    ///
    /// Observers are notified; their re-fetch finds the event gone.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `Forbidden`, `NotFound`, `Unavailable`, `Storage`.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn remove(&self, event_id: EventId, identity: &Identity) -> Result<(), ServiceError> {
        self.require_fresh(identity)?;
        self.attendance.remove(event_id, identity).await?;

        AttendanceMetrics::record_mutation("delete");
        tracing::info!("Event deleted");
        self.notify(event_id);
        Ok(())
    }

    fn require_fresh(&self, identity: &Identity) -> Result<(), ServiceError> {
        if identity.is_expired(self.attendance.clock().now()) {
            tracing::info!(user_id = %identity.user_id, "Rejected expired identity");
            return Err(ServiceError::Unauthenticated(
                "Session expired, please sign in again".to_string(),
            ));
        }
        Ok(())
    }

    fn notify(&self, event_id: EventId) {
        let delivered = self.notifier.notify(event_id);
        tracing::debug!(%event_id, delivered, "Observers notified");
    }
}

impl std::fmt::Debug for EventService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventService")
            .field("attendance", &self.attendance)
            .field("read_retry", &self.read_retry)
            .finish_non_exhaustive()
    }
}
