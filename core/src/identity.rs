//! Verified identity and the token verifier seam.
//!
//! Tokens are opaque to the core. An adapter (see `rally-auth`) turns a bearer
//! token into an [`Identity`] once per request; everything downstream works
//! with that explicit context object.

use crate::ids::UserId;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A verified caller: user identifier plus the expiry of the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Who the caller is
    pub user_id: UserId,
    /// When the proof stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub const fn new(user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            expires_at,
        }
    }

    /// Whether the identity has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Token verification failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Token is unknown, malformed or revoked.
    #[error("Invalid token")]
    Invalid,

    /// Token was valid but has expired.
    #[error("Token expired")]
    Expired,

    /// The verifier backend could not be reached.
    #[error("Token verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies opaque bearer tokens.
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and return the identity it proves.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if the token is invalid, expired, or the
    /// backend is unavailable.
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, VerifyError>> + Send + 'a>>;
}
