//! Prometheus metrics for attendance and realtime fan-out.
//!
//! # Example
//!
//! ```rust,no_run
//! use rally_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), rally_runtime::metrics::MetricsError> {
//! let recorder = MetricsRecorder::install()?;
//! let body = recorder.render(); // served at GET /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use rally_core::{JoinOutcome, LeaveOutcome};
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
///
/// Rendering is exposed over HTTP by the server's `/metrics` route.
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a recorder is
    /// already installed.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!("Prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    /// Build a recorder that is not installed globally.
    ///
    /// Useful in tests, where only one global recorder may exist per process.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder").finish_non_exhaustive()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("rally_joins_total", "Join requests by outcome");
    describe_counter!("rally_leaves_total", "Leave requests by outcome");
    describe_counter!(
        "rally_event_mutations_total",
        "Successful event creations, updates and deletions"
    );
    describe_counter!(
        "rally_notifications_total",
        "Refresh signals enqueued for observers"
    );
    describe_counter!(
        "rally_notifications_dropped_total",
        "Refresh signals not enqueued, by reason (full, closed)"
    );
    describe_counter!(
        "rally_read_retries_exhausted_total",
        "Reads that failed after exhausting retries"
    );
    describe_gauge!("rally_realtime_groups", "Events with at least one observer");
    describe_gauge!(
        "rally_realtime_connections",
        "Open realtime WebSocket connections"
    );
    describe_histogram!(
        "rally_repository_duration_seconds",
        "Repository call latency by operation"
    );
}

/// Attendance metrics recorder.
pub struct AttendanceMetrics;

impl AttendanceMetrics {
    /// Record a join outcome.
    pub fn record_join(outcome: &JoinOutcome) {
        let label = match outcome {
            JoinOutcome::Joined(_) => "joined",
            JoinOutcome::AlreadyJoined(_) => "already_joined",
        };
        counter!("rally_joins_total", "outcome" => label).increment(1);
    }

    /// Record a leave outcome.
    pub fn record_leave(outcome: &LeaveOutcome) {
        let label = match outcome {
            LeaveOutcome::Left(_) => "left",
            LeaveOutcome::NotAttending(_) => "not_attending",
        };
        counter!("rally_leaves_total", "outcome" => label).increment(1);
    }

    /// Record a successful create, update or delete.
    pub fn record_mutation(kind: &'static str) {
        counter!("rally_event_mutations_total", "kind" => kind).increment(1);
    }
}
