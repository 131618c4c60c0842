//! Attendance Manager: membership and ownership-gated mutation rules.
//!
//! Every state change goes through the repository's atomic operations. The
//! manager never decides "joined vs already joined" from a prior read; it
//! trusts the `changed` flag the repository reports for its own write.

use crate::authorization::{authorize, Decision, EventAction};
use crate::environment::Clock;
use crate::error::ServiceError;
use crate::identity::Identity;
use crate::ids::{EventId, UserId};
use crate::model::{Event, EventPatch, NewEvent};
use crate::query::EventQuery;
use crate::repository::{with_timeout, EventRepository, MembershipChange};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for a single repository call.
pub const DEFAULT_REPOSITORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The user was added
    Joined(Event),
    /// The user was already attending; nothing changed
    AlreadyJoined(Event),
}

impl JoinOutcome {
    /// The event as it stands after the request.
    #[must_use]
    pub const fn event(&self) -> &Event {
        match self {
            Self::Joined(event) | Self::AlreadyJoined(event) => event,
        }
    }

    /// Consume the outcome, keeping the event.
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Joined(event) | Self::AlreadyJoined(event) => event,
        }
    }

    /// Whether the attendee set changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Joined(_))
    }
}

impl From<MembershipChange> for JoinOutcome {
    fn from(change: MembershipChange) -> Self {
        if change.changed {
            Self::Joined(change.event)
        } else {
            Self::AlreadyJoined(change.event)
        }
    }
}

/// Result of a leave request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The user was removed
    Left(Event),
    /// The user was not attending; nothing changed
    NotAttending(Event),
}

impl LeaveOutcome {
    /// The event as it stands after the request.
    #[must_use]
    pub const fn event(&self) -> &Event {
        match self {
            Self::Left(event) | Self::NotAttending(event) => event,
        }
    }

    /// Consume the outcome, keeping the event.
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Left(event) | Self::NotAttending(event) => event,
        }
    }

    /// Whether the attendee set changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Left(_))
    }
}

impl From<MembershipChange> for LeaveOutcome {
    fn from(change: MembershipChange) -> Self {
        if change.changed {
            Self::Left(change.event)
        } else {
            Self::NotAttending(change.event)
        }
    }
}

/// Applies attendance and ownership rules against an [`EventRepository`].
///
/// Cheap to clone; all state lives behind `Arc`s.
#[derive(Clone)]
pub struct AttendanceManager {
    repository: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AttendanceManager {
    /// Create a manager with the default repository timeout.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            timeout: DEFAULT_REPOSITORY_TIMEOUT,
        }
    }

    /// Override the per-call repository deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The injected clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Add `user_id` to the event's attendee set.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    /// - `Unavailable` / `Storage`: repository failure
    pub async fn join(&self, event_id: EventId, user_id: UserId) -> Result<JoinOutcome, ServiceError> {
        let change = with_timeout(
            "add_attendee",
            self.timeout,
            self.repository.add_attendee(event_id, user_id),
        )
        .await?;

        Ok(change.into())
    }

    /// Remove `user_id` from the event's attendee set.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    /// - `Unavailable` / `Storage`: repository failure
    pub async fn leave(&self, event_id: EventId, user_id: UserId) -> Result<LeaveOutcome, ServiceError> {
        let change = with_timeout(
            "remove_attendee",
            self.timeout,
            self.repository.remove_attendee(event_id, user_id),
        )
        .await?;

        Ok(change.into())
    }

    /// Apply an owner's partial update.
    ///
    /// # Errors
    ///
    /// - `Validation`: the patch is empty or has blank fields
    /// - `NotFound`: the event does not exist
    /// - `Forbidden`: the caller does not own the event
    pub async fn mutate(
        &self,
        event_id: EventId,
        identity: &Identity,
        patch: EventPatch,
    ) -> Result<Event, ServiceError> {
        patch.validate()?;
        self.require_owner(event_id, identity, EventAction::Edit).await?;

        let now = self.clock.now();
        let event = with_timeout(
            "replace_fields",
            self.timeout,
            self.repository.replace_fields(event_id, patch, now),
        )
        .await?;

        Ok(event)
    }

    /// Delete an event on behalf of its owner.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    /// - `Forbidden`: the caller does not own the event
    pub async fn remove(&self, event_id: EventId, identity: &Identity) -> Result<(), ServiceError> {
        self.require_owner(event_id, identity, EventAction::Delete).await?;

        with_timeout("delete", self.timeout, self.repository.delete(event_id)).await?;
        Ok(())
    }

    /// Create an event owned by the caller.
    ///
    /// # Errors
    ///
    /// - `Validation`: required fields are blank
    /// - `Unavailable` / `Storage`: repository failure
    pub async fn create(&self, identity: &Identity, input: NewEvent) -> Result<Event, ServiceError> {
        input.validate()?;

        let event = Event::new(EventId::new(), identity.user_id, input, self.clock.now());
        let id = with_timeout("create", self.timeout, self.repository.create(event.clone())).await?;

        debug_assert_eq!(id, event.id);
        Ok(event)
    }

    /// Load one event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    pub async fn get(&self, event_id: EventId) -> Result<Event, ServiceError> {
        Ok(with_timeout("find_by_id", self.timeout, self.repository.find_by_id(event_id)).await?)
    }

    /// List events matching `query`.
    ///
    /// # Errors
    ///
    /// Repository failures only.
    pub async fn list(&self, query: EventQuery) -> Result<Vec<Event>, ServiceError> {
        let now = self.clock.now();
        Ok(with_timeout("find_all", self.timeout, self.repository.find_all(query, now)).await?)
    }

    async fn require_owner(
        &self,
        event_id: EventId,
        identity: &Identity,
        action: EventAction,
    ) -> Result<Event, ServiceError> {
        let event = self.get(event_id).await?;

        match authorize(identity, event.owner, action) {
            Decision::Authorized => Ok(event),
            Decision::Forbidden => {
                tracing::info!(
                    event_id = %event_id,
                    user_id = %identity.user_id,
                    ?action,
                    "Rejected non-owner mutation"
                );
                Err(ServiceError::Forbidden(format!(
                    "Only the event owner may {} this event",
                    match action {
                        EventAction::Delete => "delete",
                        _ => "update",
                    }
                )))
            }
        }
    }
}

impl std::fmt::Debug for AttendanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceManager")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
