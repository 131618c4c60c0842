//! HTTP request handlers shared by Rally binaries.

pub mod health;
pub mod realtime;

pub use health::{health_check, readiness_response};
pub use realtime::{ClientMessage, Realtime, ServerMessage};
