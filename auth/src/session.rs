//! Session records and the session store seam.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use rally_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// Unique identifier for a session. Its string form is the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = crate::error::AuthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| crate::error::AuthError::InvalidToken)
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: SessionId,

    /// The signed-in user.
    pub user_id: UserId,

    /// Session creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Session expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id` at `now`, valid for `ttl`.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The bearer token that proves this session.
    #[must_use]
    pub fn token(&self) -> String {
        self.session_id.to_string()
    }
}

/// Session store.
///
/// Sessions are ephemeral: backends expire them on their own, and readers
/// still check `expires_at` against their own clock.
pub trait SessionStore: Send + Sync {
    /// Create session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionExists`](crate::AuthError::SessionExists)
    /// if the identifier is taken, or a backend error.
    fn create_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Get session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionNotFound`](crate::AuthError::SessionNotFound)
    /// if the session is absent, or a backend error.
    fn get_session(&self, session_id: SessionId) -> impl Future<Output = Result<Session>> + Send;

    /// Delete session. Deleting an absent session succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the backend request fails.
    fn delete_session(&self, session_id: SessionId) -> impl Future<Output = Result<()>> + Send;
}
