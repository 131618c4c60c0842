//! List filters and sort orders for `find_all`.

use crate::model::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether to keep future or past events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// `date >= now`
    Upcoming,
    /// `date < now`
    Past,
}

/// List ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Latest date first
    #[default]
    Newest,
    /// Earliest date first
    Oldest,
    /// Most attendees first
    Popular,
}

/// Filter and ordering for event listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    /// Exact category match
    #[serde(default)]
    pub category: Option<String>,
    /// Upcoming or past relative to now
    #[serde(default)]
    pub when: Option<TimeWindow>,
    /// Case-insensitive substring of the name
    #[serde(default)]
    pub search: Option<String>,
    /// Ordering of results
    #[serde(default)]
    pub sort: SortOrder,
}

impl EventQuery {
    /// Query matching every event, newest first.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `event` passes every filter at time `now`.
    #[must_use]
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if let Some(category) = self.category() {
            if event.category != category {
                return false;
            }
        }

        match self.when {
            Some(TimeWindow::Upcoming) if event.date < now => return false,
            Some(TimeWindow::Past) if event.date >= now => return false,
            _ => {}
        }

        if let Some(needle) = self.search_term() {
            if !event.name.to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }

    /// Order events in place.
    ///
    /// Ties fall back to creation time then identifier so results are stable
    /// across calls.
    pub fn sort(&self, events: &mut [Event]) {
        match self.sort {
            SortOrder::Newest => events.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            }),
            SortOrder::Oldest => events.sort_by(|a, b| {
                a.date
                    .cmp(&b.date)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            }),
            SortOrder::Popular => events.sort_by(|a, b| {
                b.attendees
                    .len()
                    .cmp(&a.attendees.len())
                    .then_with(|| b.date.cmp(&a.date))
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
    }

    /// Filter then sort.
    #[must_use]
    pub fn apply(&self, events: impl IntoIterator<Item = Event>, now: DateTime<Utc>) -> Vec<Event> {
        let mut out: Vec<Event> = events
            .into_iter()
            .filter(|event| self.matches(event, now))
            .collect();
        self.sort(&mut out);
        out
    }

    /// Non-blank category filter.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Non-blank, lowercased search term.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}
