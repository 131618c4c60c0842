//! # Rally Core
//!
//! Domain types and rules for event attendance with live updates.
//!
//! This crate is the functional heart of Rally. It owns:
//!
//! - **Identifiers**: canonical `UserId` / `EventId` newtypes
//! - **Model**: `Event`, its attendee set, creation and patch payloads
//! - **Authorization**: the single-owner guard
//! - **Attendance**: join/leave/mutate/remove rules over an [`EventRepository`]
//! - **Seams**: traits for the external collaborators (repository, token
//!   verifier, notifier, clock)
//!
//! ## Architecture
//!
//! ```text
//! caller ──> EventService (rally-runtime)
//!                │
//!                ├──> AttendanceManager ──> EventRepository (atomic add/remove)
//!                │
//!                └──> Notifier ──> observers re-fetch
//! ```
//!
//! Nothing in this crate performs I/O directly. Storage, identity and fan-out
//! are reached through the traits in [`repository`], [`identity`] and
//! [`notify`], so the rules can be exercised against in-memory fakes.
//!
//! [`EventRepository`]: repository::EventRepository

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attendance;
pub mod authorization;
pub mod environment;
pub mod error;
pub mod ids;
pub mod identity;
pub mod model;
pub mod notify;
pub mod query;
pub mod repository;

// Re-export commonly used types
pub use attendance::{AttendanceManager, JoinOutcome, LeaveOutcome};
pub use authorization::{authorize, Decision, EventAction};
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::ServiceError;
pub use ids::{EventId, IdParseError, UserId};
pub use identity::{Identity, TokenVerifier, VerifyError};
pub use model::{AttendeeSet, Event, EventPatch, NewEvent, User};
pub use notify::Notifier;
pub use query::{EventQuery, SortOrder, TimeWindow};
pub use repository::{EventRepository, MembershipChange, RepositoryError, RepositoryFuture};
