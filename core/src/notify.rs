//! Change notification seam.

use crate::ids::EventId;

/// Delivers "refresh" signals for an event to whoever is watching it.
///
/// Implementations must not block beyond enqueueing and must never surface
/// delivery failures to the caller. Only the event service holds a
/// `Notifier`; observers get a subscription handle instead.
pub trait Notifier: Send + Sync {
    /// Signal every observer of `event_id`.
    ///
    /// Returns the number of observers the signal was enqueued for.
    fn notify(&self, event_id: EventId) -> usize;
}
