//! Axum integration for Rally.
//!
//! This crate is the HTTP edge around the attendance core:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, WebSocket
//! │  - Bearer token → Identity              │  ← correlation IDs, logging
//! │  - AppError → {code, message}           │
//! ├─────────────────────────────────────────┤
//! │         Attendance core                 │
//! │  - EventService / AttendanceManager     │  ← rally-core, rally-runtime
//! │  - Broadcaster                          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **Correlation** middleware tags the request and its span
//! 2. **Extract** path, body and [`Authenticated`] identity
//! 3. **Call** the `EventService`
//! 4. **Map** the result (or [`AppError`]) to an HTTP response
//!
//! Routes themselves live in `rally-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{Authenticated, CorrelationId};
pub use handlers::Realtime;
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
