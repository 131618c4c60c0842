//! In-memory event repository.
//!
//! Every operation takes the write lock for its whole critical section, so
//! membership changes are atomic exactly the way the Postgres statements are.

use chrono::{DateTime, Utc};
use rally_core::repository::{EventRepository, MembershipChange, RepositoryError, RepositoryFuture};
use rally_core::{Event, EventId, EventPatch, EventQuery, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct Faults {
    latency: Option<Duration>,
    failures: VecDeque<RepositoryError>,
    calls: HashMap<&'static str, usize>,
}

/// `HashMap`-backed [`EventRepository`] for fast, deterministic tests.
///
/// Supports latency and failure injection for timeout and retry tests.
///
/// # Example
///
/// ```
/// use rally_testing::InMemoryEventRepository;
/// use rally_core::RepositoryError;
///
/// let repository = InMemoryEventRepository::new();
/// repository.fail_next(RepositoryError::Unavailable("connection reset".into()));
/// assert!(repository.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventRepository {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryEventRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event directly, bypassing validation.
    pub fn seed(&self, event: Event) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.id, event);
    }

    /// Snapshot of a stored event.
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<Event> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of stored events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no events are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.faults().latency = Some(latency);
    }

    /// Make the next call fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: RepositoryError) {
        self.faults().failures.push_back(error);
    }

    /// How many times `operation` was invoked (e.g. `"find_by_id"`).
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.faults().calls.get(operation).copied().unwrap_or(0)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then apply injected latency and failures.
    async fn enter(&self, operation: &'static str) -> Result<(), RepositoryError> {
        let (latency, failure) = {
            let mut faults = self.faults();
            *faults.calls.entry(operation).or_insert(0) += 1;
            (faults.latency, faults.failures.pop_front())
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        failure.map_or(Ok(()), Err)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut HashMap<EventId, Event>) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| RepositoryError::Database("lock poisoned".to_string()))?;
        f(&mut events)
    }

    fn membership(
        &self,
        id: EventId,
        mutate: impl FnOnce(&mut Event) -> bool,
    ) -> Result<MembershipChange, RepositoryError> {
        self.write(|events| {
            let event = events.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
            let changed = mutate(event);
            Ok(MembershipChange {
                event: event.clone(),
                changed,
            })
        })
    }
}

impl EventRepository for InMemoryEventRepository {
    fn create(&self, event: Event) -> RepositoryFuture<'_, EventId> {
        Box::pin(async move {
            self.enter("create").await?;
            self.write(|events| {
                if events.contains_key(&event.id) {
                    return Err(RepositoryError::Database(format!(
                        "duplicate event id {}",
                        event.id
                    )));
                }
                let id = event.id;
                events.insert(id, event);
                Ok(id)
            })
        })
    }

    fn find_by_id(&self, id: EventId) -> RepositoryFuture<'_, Event> {
        Box::pin(async move {
            self.enter("find_by_id").await?;
            self.get(id).ok_or(RepositoryError::NotFound(id))
        })
    }

    fn find_all(&self, query: EventQuery, now: DateTime<Utc>) -> RepositoryFuture<'_, Vec<Event>> {
        Box::pin(async move {
            self.enter("find_all").await?;
            let snapshot: Vec<Event> = self
                .events
                .read()
                .map_err(|_| RepositoryError::Database("lock poisoned".to_string()))?
                .values()
                .cloned()
                .collect();
            Ok(query.apply(snapshot, now))
        })
    }

    fn replace_fields(
        &self,
        id: EventId,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> RepositoryFuture<'_, Event> {
        Box::pin(async move {
            self.enter("replace_fields").await?;
            self.write(|events| {
                let event = events.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
                patch.apply_to(event, now);
                Ok(event.clone())
            })
        })
    }

    fn delete(&self, id: EventId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            self.enter("delete").await?;
            self.write(|events| {
                events
                    .remove(&id)
                    .map(|_| ())
                    .ok_or(RepositoryError::NotFound(id))
            })
        })
    }

    fn add_attendee(&self, id: EventId, user_id: UserId) -> RepositoryFuture<'_, MembershipChange> {
        Box::pin(async move {
            self.enter("add_attendee").await?;
            self.membership(id, |event| event.attendees.insert(user_id))
        })
    }

    fn remove_attendee(
        &self,
        id: EventId,
        user_id: UserId,
    ) -> RepositoryFuture<'_, MembershipChange> {
        Box::pin(async move {
            self.enter("remove_attendee").await?;
            self.membership(id, |event| event.attendees.remove(&user_id))
        })
    }
}
