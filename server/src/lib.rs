//! Rally server: event attendance with live updates.
//!
//! Wires the attendance core to HTTP and the realtime channel:
//!
//! ```text
//!   HTTP (axum) ──► EventService ──► AttendanceManager ──► EventRepository
//!                        │                                  (PostgreSQL)
//!                        ▼
//!                   Broadcaster ──► observers on GET /api/ws
//! ```
//!
//! Identity comes from a bearer session token, verified once per request
//! against the Redis session store.
//!
//! # Modules
//!
//! - [`config`]: environment-driven configuration
//! - [`api`]: REST handlers for events and attendance
//! - [`server`]: application state, router, health and metrics endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod server;

pub use config::Config;
pub use server::{build_router, AppState};
