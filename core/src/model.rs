//! Domain model: users, events and attendee sets.

use crate::error::ServiceError;
use crate::ids::{EventId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// User
// ============================================================================

/// A registered user.
///
/// Users are created by the external auth service at registration. Rally only
/// ever refers to them by [`UserId`]; the credential hash is carried opaquely
/// and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Credential hash, owned by the auth service
    #[serde(skip)]
    pub credential_hash: Option<String>,
}

// ============================================================================
// Attendee set
// ============================================================================

/// Set of attending users, kept in join order.
///
/// A user appears at most once. Construction from a `Vec` drops duplicates,
/// so a set read back from storage can never carry a repeated entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct AttendeeSet(Vec<UserId>);

impl AttendeeSet {
    /// Create an empty attendee set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a user. Returns `false` if the user was already present.
    pub fn insert(&mut self, user_id: UserId) -> bool {
        if self.contains(&user_id) {
            return false;
        }
        self.0.push(user_id);
        true
    }

    /// Remove a user. Returns `false` if the user was not present.
    pub fn remove(&mut self, user_id: &UserId) -> bool {
        let before = self.0.len();
        self.0.retain(|id| id != user_id);
        self.0.len() != before
    }

    /// Whether the user attends.
    #[must_use]
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.0.contains(user_id)
    }

    /// Number of attendees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nobody attends.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in join order.
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

impl From<Vec<UserId>> for AttendeeSet {
    fn from(ids: Vec<UserId>) -> Self {
        let mut set = Self::new();
        for id in ids {
            set.insert(id);
        }
        set
    }
}

impl From<AttendeeSet> for Vec<UserId> {
    fn from(set: AttendeeSet) -> Self {
        set.0
    }
}

impl FromIterator<UserId> for AttendeeSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

// ============================================================================
// Event
// ============================================================================

/// A plannable gathering with one owner and a set of attendees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Event name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: String,
    /// Category (e.g. conference, workshop, meetup)
    pub category: String,
    /// The creating user; immutable
    pub owner: UserId,
    /// Reference into the image store
    pub image: Option<String>,
    /// Users currently attending
    pub attendees: AttendeeSet,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last field or membership change
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Build a new event owned by `owner` from validated creation input.
    #[must_use]
    pub fn new(id: EventId, owner: UserId, input: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            date: input.date,
            location: input.location.trim().to_string(),
            category: input.category.trim().to_string(),
            owner,
            image: input.image.map(|image| image.trim().to_string()),
            attendees: AttendeeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` is in the attendee set.
    #[must_use]
    pub fn is_attending(&self, user_id: &UserId) -> bool {
        self.attendees.contains(user_id)
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event name
    pub name: String,
    /// Description
    pub description: String,
    /// Date and time
    pub date: DateTime<Utc>,
    /// Location
    pub location: String,
    /// Category
    pub category: String,
    /// Optional image reference
    #[serde(default)]
    pub image: Option<String>,
}

impl NewEvent {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] naming every blank field.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let blank: Vec<&str> = [
            ("name", &self.name),
            ("description", &self.description),
            ("location", &self.location),
            ("category", &self.category),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if !blank.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing required fields: {}",
                blank.join(", ")
            )));
        }

        if let Some(image) = &self.image {
            if image.trim().is_empty() {
                return Err(ServiceError::Validation(
                    "Image reference must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Partial update of an event's owner-editable fields.
///
/// Owner and attendees are absent: the owner never changes and
/// attendees only move through join/leave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventPatch {
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New date
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// New location
    #[serde(default)]
    pub location: Option<String>,
    /// New category
    #[serde(default)]
    pub category: Option<String>,
    /// New image reference
    #[serde(default)]
    pub image: Option<String>,
}

impl EventPatch {
    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.location.is_none()
            && self.category.is_none()
            && self.image.is_none()
    }

    /// Reject empty patches and blank text fields.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] if nothing would change or a
    /// supplied text field is blank.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.is_empty() {
            return Err(ServiceError::Validation(
                "Update must set at least one field".to_string(),
            ));
        }

        let blank: Vec<&str> = [
            ("name", self.name.as_deref()),
            ("description", self.description.as_deref()),
            ("location", self.location.as_deref()),
            ("category", self.category.as_deref()),
            ("image", self.image.as_deref()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_some_and(|v| v.trim().is_empty()))
        .map(|(field, _)| field)
        .collect();

        if blank.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(format!(
                "Fields must not be blank: {}",
                blank.join(", ")
            )))
        }
    }

    /// Apply the supplied fields to `event`, leaving the rest untouched.
    pub fn apply_to(&self, event: &mut Event, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            event.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            event.description = description.trim().to_string();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = &self.location {
            event.location = location.trim().to_string();
        }
        if let Some(category) = &self.category {
            event.category = category.trim().to_string();
        }
        if let Some(image) = &self.image {
            event.image = Some(image.trim().to_string());
        }
        event.updated_at = now;
    }
}
