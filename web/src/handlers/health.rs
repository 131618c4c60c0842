//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{http::StatusCode, Json};
use rally_runtime::{HealthReport, HealthStatus};

/// Liveness probe.
///
/// Returns 200 OK while the process is serving requests. Does NOT check
/// dependencies.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Render a readiness report.
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy
///
/// ```json
/// {
///   "status": "healthy",
///   "checks": [{ "component": "postgres", "status": "healthy" }],
///   "timestamp": "2025-01-01T00:00:00Z"
/// }
/// ```
#[must_use]
pub fn readiness_response(report: HealthReport) -> (StatusCode, Json<HealthReport>) {
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    if status != StatusCode::OK {
        tracing::warn!(report = ?report.checks, "Readiness check failed");
    }

    (status, Json(report))
}
