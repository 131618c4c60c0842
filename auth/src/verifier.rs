//! Bearer token verification against a [`SessionStore`].

use crate::error::AuthError;
use crate::session::{SessionId, SessionStore};
use rally_core::{Clock, Identity, TokenVerifier, VerifyError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Turns an opaque session token into an [`Identity`].
///
/// The token is the session identifier. The identity carries the session's
/// `expires_at`, so a request that outlives its session still fails closed
/// downstream.
pub struct SessionTokenVerifier<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> SessionTokenVerifier<S> {
    /// Create a verifier over `store`, judging expiry with `clock`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    async fn verify_session(&self, token: &str) -> Result<Identity, AuthError> {
        let session_id: SessionId = token.parse()?;
        let session = self.store.get_session(session_id).await?;

        if session.is_expired(self.clock.now()) {
            tracing::debug!(session_id = %session_id, "Session expired");
            return Err(AuthError::SessionExpired);
        }

        Ok(Identity::new(session.user_id, session.expires_at))
    }
}

impl<S: SessionStore> TokenVerifier for SessionTokenVerifier<S> {
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, VerifyError>> + Send + 'a>> {
        Box::pin(async move {
            self.verify_session(token).await.map_err(|e| {
                if let AuthError::Unavailable(reason) = &e {
                    tracing::warn!(error = %reason, "Session store unavailable");
                }
                VerifyError::from(e)
            })
        })
    }
}

impl<S> std::fmt::Debug for SessionTokenVerifier<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenVerifier").finish_non_exhaustive()
    }
}
