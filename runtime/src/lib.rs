//! # Rally Runtime
//!
//! Runtime side of the attendance core.
//!
//! ## Core Components
//!
//! - **`EventService`**: composition root; applies changes through the
//!   Attendance Manager and triggers notifications
//! - **`Broadcaster`**: per-event observer groups with non-blocking fan-out
//! - **Retry**: exponential backoff for idempotent reads
//! - **Metrics**: Prometheus recorder and metric descriptions
//! - **Health**: component health reports
//!
//! ## Example
//!
//! ```
//! use rally_core::{AttendanceManager, SystemClock};
//! use rally_runtime::{Broadcaster, EventService};
//! use rally_testing::InMemoryEventRepository;
//! use std::sync::Arc;
//!
//! let broadcaster = Broadcaster::default();
//! let subscriptions = broadcaster.subscriptions(); // hand to the WebSocket layer
//!
//! let attendance = AttendanceManager::new(
//!     Arc::new(InMemoryEventRepository::new()),
//!     Arc::new(SystemClock),
//! );
//! let service = EventService::new(attendance, Arc::new(broadcaster));
//! # let _ = (service, subscriptions);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Realtime observer groups and refresh fan-out
pub mod broadcaster;

/// Component health checks
pub mod health;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Event Service orchestration
pub mod service;

pub use broadcaster::{Broadcaster, Observer, ObserverId, Refresh, Subscriptions};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use retry::RetryPolicy;
pub use service::EventService;
