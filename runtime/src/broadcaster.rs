//! Realtime broadcaster: per-event observer groups and refresh fan-out.
//!
//! # Architecture
//!
//! ```text
//! EventService ──notify(E)──> Broadcaster ──try_send──> observer queue ──> WebSocket
//!                                  │
//! WebSocket ──subscribe(E)──> Subscriptions
//! ```
//!
//! Every observer owns one bounded queue. A refresh carries no payload, so
//! when an observer's queue is full the new signal is dropped: the observer
//! already has a pending refresh and will re-fetch anyway. An observer whose
//! receiver has gone away is pruned from every group on the next notify.
//!
//! Groups exist only while they have members. Unsubscribing the last member
//! discards the group.
//!
//! # Capabilities
//!
//! The broadcaster is split in two:
//!
//! - [`Broadcaster`] implements [`Notifier`] and is handed to the event
//!   service only.
//! - [`Subscriptions`] can register observers and manage their groups but
//!   cannot notify. It is what the WebSocket layer receives.

use rally_core::{EventId, Notifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default capacity of each observer's queue.
pub const DEFAULT_OBSERVER_BUFFER: usize = 16;

/// Identifier of one observer (typically one WebSocket connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// "Re-fetch this event" signal delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refresh {
    /// The event whose state changed
    pub event_id: EventId,
}

/// A registered observer.
///
/// Dropping the paired receiver is how an observer disconnects; the handle
/// itself only identifies it to [`Subscriptions`].
#[derive(Debug, Clone)]
pub struct Observer {
    id: ObserverId,
    sender: mpsc::Sender<Refresh>,
}

impl Observer {
    /// The observer's identifier
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }
}

type Group = HashMap<ObserverId, mpsc::Sender<Refresh>>;

#[derive(Debug, Default)]
struct Shared {
    groups: RwLock<HashMap<EventId, Group>>,
    next_observer: AtomicU64,
}

impl Shared {
    fn groups(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EventId, Group>> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn groups_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EventId, Group>> {
        self.groups.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record_group_count(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!("rally_realtime_groups").set(count as f64);
}

/// Owner of the observer groups; the only type that can notify.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
    buffer: usize,
}

impl Broadcaster {
    /// Create a broadcaster whose observers each buffer up to `buffer` signals.
    ///
    /// A zero buffer is raised to one.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            buffer: buffer.max(1),
        }
    }

    /// Subscription handle for observers.
    #[must_use]
    pub fn subscriptions(&self) -> Subscriptions {
        Subscriptions {
            shared: Arc::clone(&self.shared),
            buffer: self.buffer,
        }
    }

    /// Number of non-empty groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.shared.groups().len()
    }

    /// Number of observers in one group.
    #[must_use]
    pub fn observer_count(&self, event_id: EventId) -> usize {
        self.shared.groups().get(&event_id).map_or(0, HashMap::len)
    }

    fn prune(&self, event_id: EventId, closed: &[ObserverId]) {
        let mut groups = self.shared.groups_mut();
        if let Some(group) = groups.get_mut(&event_id) {
            for id in closed {
                group.remove(id);
            }
            if group.is_empty() {
                groups.remove(&event_id);
            }
        }
        // A closed observer's receiver is gone for every group it joined.
        for group in groups.values_mut() {
            group.retain(|_, sender| !sender.is_closed());
        }
        groups.retain(|_, group| !group.is_empty());
        record_group_count(groups.len());
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVER_BUFFER)
    }
}

impl Notifier for Broadcaster {
    fn notify(&self, event_id: EventId) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let groups = self.shared.groups();
            let Some(group) = groups.get(&event_id) else {
                return 0;
            };

            for (observer, sender) in group {
                match sender.try_send(Refresh { event_id }) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!(%event_id, %observer, "Observer queue full, refresh already pending");
                        metrics::counter!("rally_notifications_dropped_total", "reason" => "full")
                            .increment(1);
                    }
                    Err(TrySendError::Closed(_)) => {
                        metrics::counter!("rally_notifications_dropped_total", "reason" => "closed")
                            .increment(1);
                        closed.push(*observer);
                    }
                }
            }
        }

        if !closed.is_empty() {
            tracing::debug!(%event_id, pruned = closed.len(), "Pruning closed observers");
            self.prune(event_id, &closed);
        }

        metrics::counter!("rally_notifications_total").increment(delivered as u64);
        tracing::debug!(%event_id, delivered, "Refresh broadcast");
        delivered
    }
}

/// Subscribe/unsubscribe capability handed to observers.
///
/// Has no way to notify.
#[derive(Debug, Clone)]
pub struct Subscriptions {
    shared: Arc<Shared>,
    buffer: usize,
}

impl Subscriptions {
    /// Register a new observer and return its handle and signal receiver.
    #[must_use]
    pub fn register(&self) -> (Observer, mpsc::Receiver<Refresh>) {
        let id = ObserverId(self.shared.next_observer.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.buffer);
        (Observer { id, sender }, receiver)
    }

    /// Add `observer` to the group for `event_id`, creating the group if needed.
    ///
    /// Returns `false` if the observer was already a member.
    pub fn subscribe(&self, event_id: EventId, observer: &Observer) -> bool {
        let mut groups = self.shared.groups_mut();
        let added = groups
            .entry(event_id)
            .or_default()
            .insert(observer.id, observer.sender.clone())
            .is_none();
        record_group_count(groups.len());
        drop(groups);

        tracing::debug!(%event_id, observer = %observer.id, added, "Observer subscribed");
        added
    }

    /// Remove `observer` from the group for `event_id`, discarding the group
    /// once empty.
    ///
    /// Returns `false` if the observer was not a member.
    pub fn unsubscribe(&self, event_id: EventId, observer: &Observer) -> bool {
        let mut groups = self.shared.groups_mut();
        let removed = match groups.get_mut(&event_id) {
            Some(group) => {
                let removed = group.remove(&observer.id).is_some();
                if group.is_empty() {
                    groups.remove(&event_id);
                }
                removed
            }
            None => false,
        };
        record_group_count(groups.len());
        drop(groups);

        tracing::debug!(%event_id, observer = %observer.id, removed, "Observer unsubscribed");
        removed
    }

    /// Remove `observer` from every group. Returns how many groups it left.
    pub fn unsubscribe_all(&self, observer: &Observer) -> usize {
        let mut groups = self.shared.groups_mut();
        let mut left = 0;
        groups.retain(|_, group| {
            if group.remove(&observer.id).is_some() {
                left += 1;
            }
            !group.is_empty()
        });
        record_group_count(groups.len());
        left
    }

    /// Number of non-empty groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.shared.groups().len()
    }

    /// Number of observers in one group.
    #[must_use]
    pub fn observer_count(&self, event_id: EventId) -> usize {
        self.shared.groups().get(&event_id).map_or(0, HashMap::len)
    }
}
