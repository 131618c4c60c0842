//! Token verifier fake.

use rally_core::identity::{Identity, TokenVerifier, VerifyError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

/// Verifies tokens against a fixed table.
///
/// Unknown tokens are `Invalid`; tokens whose identity has already expired are
/// still returned so the service's own expiry check can be exercised.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: Arc<RwLock<HashMap<String, Identity>>>,
}

impl StaticTokenVerifier {
    /// Create an empty verifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as proving `identity`.
    pub fn insert(&self, token: impl Into<String>, identity: Identity) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), identity);
    }

    /// Builder-style [`Self::insert`].
    #[must_use]
    pub fn with_token(self, token: impl Into<String>, identity: Identity) -> Self {
        self.insert(token, identity);
        self
    }

    /// Forget a token.
    pub fn revoke(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, VerifyError>> + Send + 'a>> {
        Box::pin(async move {
            self.tokens
                .read()
                .map_err(|_| VerifyError::Unavailable("lock poisoned".to_string()))?
                .get(token)
                .copied()
                .ok_or(VerifyError::Invalid)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_known_and_unknown_tokens() {
        let identity = fixtures::identity();
        let verifier = StaticTokenVerifier::new().with_token("alice", identity);

        assert_eq!(verifier.verify("alice").await.unwrap(), identity);
        assert_eq!(verifier.verify("mallory").await, Err(VerifyError::Invalid));

        verifier.revoke("alice");
        assert_eq!(verifier.verify("alice").await, Err(VerifyError::Invalid));
    }
}
