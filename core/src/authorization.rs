//! Single-owner authorization guard.

use crate::identity::Identity;
use crate::ids::UserId;

/// What the caller is trying to do to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Change name, description, date, location, category or image
    Edit,
    /// Delete the event
    Delete,
    /// Add oneself to the attendee set
    Join,
    /// Remove oneself from the attendee set
    Leave,
}

impl EventAction {
    /// Whether the action is reserved for the owner.
    #[must_use]
    pub const fn requires_owner(self) -> bool {
        matches!(self, Self::Edit | Self::Delete)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed
    Authorized,
    /// The identity is valid but lacks ownership
    Forbidden,
}

impl Decision {
    /// Whether the decision allows the action.
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Decide whether `identity` may perform `action` on an event owned by `owner`.
///
/// Expiry is not checked here; callers reject expired identities before they
/// reach the guard.
#[must_use]
pub fn authorize(identity: &Identity, owner: UserId, action: EventAction) -> Decision {
    if !action.requires_owner() || identity.user_id == owner {
        Decision::Authorized
    } else {
        Decision::Forbidden
    }
}
