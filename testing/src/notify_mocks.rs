//! Notifier fake that records calls.

use rally_core::{EventId, Notifier};
use std::sync::{Arc, Mutex, PoisonError};

/// Captures every `notify` call in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<EventId>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notified event, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<EventId> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `event_id` was notified.
    #[must_use]
    pub fn count(&self, event_id: EventId) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|id| **id == event_id)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event_id: EventId) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event_id);
        0
    }
}
