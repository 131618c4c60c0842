//! # Rally Auth
//!
//! Session-backed implementation of [`rally_core::TokenVerifier`].
//!
//! Rally never issues credentials. A session is created elsewhere and its
//! identifier is handed to the client as an opaque bearer token. On each
//! request the token is parsed, the session is loaded from a
//! [`SessionStore`], and an [`Identity`](rally_core::Identity) comes out the
//! other end.
//!
//! ## Stores
//!
//! - [`stores::RedisSessionStore`]: production store, bincode values with
//!   Redis TTLs
//! - [`stores::InMemorySessionStore`]: tests and local development
//!
//! ## Example
//!
//! ```
//! use rally_auth::{stores::InMemorySessionStore, Session, SessionStore, SessionTokenVerifier};
//! use rally_core::{SystemClock, TokenVerifier, UserId};
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemorySessionStore::new();
//! let session = Session::new(UserId::new(), Utc::now(), Duration::hours(24));
//! store.create_session(&session).await?;
//!
//! let verifier = SessionTokenVerifier::new(store, Arc::new(SystemClock));
//! let identity = verifier.verify(&session.token()).await?;
//! assert_eq!(identity.user_id, session.user_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod session;
pub mod stores;
pub mod verifier;

pub use error::{AuthError, Result};
pub use session::{Session, SessionId, SessionStore};
pub use verifier::SessionTokenVerifier;
