//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation ID
//! - [`Authenticated`]: the caller's verified [`Identity`]
//!
//! # Examples
//!
//! ```ignore
//! use rally_web::extractors::{Authenticated, CorrelationId};
//!
//! async fn join(
//!     State(state): State<AppState>,
//!     Authenticated(identity): Authenticated,
//!     correlation_id: CorrelationId,
//!     Path(id): Path<EventId>,
//! ) -> Result<Json<MembershipResponse>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, user_id = %identity.user_id, "Joining");
//!     // ...
//! }
//! ```

use crate::error::AppError;
use crate::middleware::correlation_id_from_headers;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use rally_core::{Identity, TokenVerifier};
use std::sync::Arc;
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Prefers the value stored by the correlation middleware so handlers and
/// response headers agree; otherwise reads `X-Correlation-ID` or generates a
/// new UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }
        Ok(Self(correlation_id_from_headers(&parts.headers)))
    }
}

/// The caller's identity, verified once per request from
/// `Authorization: Bearer <token>`.
///
/// The application state must expose an `Arc<dyn TokenVerifier>` through
/// [`FromRef`]. Missing, unknown and expired tokens reject with 401; an
/// unreachable verifier rejects with 503.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Arc<dyn TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?
            .to_owned();

        let verifier = <Arc<dyn TokenVerifier> as FromRef<S>>::from_ref(state);
        let identity = verifier.verify(&token).await.map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AppError::from(e)
        })?;

        Ok(Self(identity))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use rally_testing::{fixtures, StaticTokenVerifier};

    #[derive(Clone)]
    struct TestState {
        verifier: Arc<dyn TokenVerifier>,
    }

    impl FromRef<TestState> for Arc<dyn TokenVerifier> {
        fn from_ref(state: &TestState) -> Self {
            Arc::clone(&state.verifier)
        }
    }

    fn state_with(token: &str, identity: Identity) -> TestState {
        TestState {
            verifier: Arc::new(StaticTokenVerifier::new().with_token(token, identity)),
        }
    }

    async fn extract(state: &TestState, authorization: Option<&str>) -> Result<Authenticated, AppError> {
        let mut builder = Request::builder();
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).expect("Valid request").into_parts();
        Authenticated::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header("X-Correlation-ID", uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let stored = Uuid::new_v4();
        let req = Request::builder()
            .header("X-Correlation-ID", Uuid::new_v4().to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        parts.extensions.insert(CorrelationId(stored));
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, stored);
    }

    #[tokio::test]
    async fn test_bearer_token_yields_identity() {
        let identity = fixtures::identity();
        let state = state_with("alice-token", identity);

        let Authenticated(extracted) = extract(&state, Some("Bearer alice-token")).await.unwrap();
        assert_eq!(extracted, identity);

        let Authenticated(extracted) = extract(&state, Some("bearer   alice-token ")).await.unwrap();
        assert_eq!(extracted, identity);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_is_unauthorized() {
        let state = state_with("alice-token", fixtures::identity());

        for header in [None, Some("alice-token"), Some("Basic alice-token"), Some("Bearer ")] {
            let err = extract(&state, header).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "header {header:?}");
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let state = state_with("alice-token", fixtures::identity());

        let err = extract(&state, Some("Bearer mallory-token")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
