//! Health, readiness and metrics endpoints.
//!
//! Liveness (`/health`) never touches dependencies. Readiness (`/ready`)
//! pings every registered [`ReadinessProbe`] and aggregates the results.

use super::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use rally_auth::stores::RedisSessionStore;
use rally_postgres::PostgresEventRepository;
use rally_runtime::{HealthCheck, HealthReport};
use std::future::Future;
use std::pin::Pin;

pub use rally_web::handlers::health_check;

/// A dependency that can report whether it is reachable.
pub trait ReadinessProbe: Send + Sync {
    /// Component name shown in the readiness report.
    fn component(&self) -> &'static str;

    /// Check the dependency.
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>>;
}

impl ReadinessProbe for PostgresEventRepository {
    fn component(&self) -> &'static str {
        "postgres"
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match self.ping().await {
                Ok(()) => HealthCheck::healthy(self.component()),
                Err(e) => HealthCheck::unhealthy(self.component(), e.to_string()),
            }
        })
    }
}

impl ReadinessProbe for RedisSessionStore {
    fn component(&self) -> &'static str {
        "redis"
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match self.ping().await {
                Ok(()) => HealthCheck::healthy(self.component()),
                Err(e) => HealthCheck::unhealthy(self.component(), e.to_string()),
            }
        })
    }
}

/// Readiness check endpoint.
///
/// Returns 200 when every probe is healthy or degraded, 503 otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"healthy","checks":[{"component":"postgres","status":"healthy"}],...}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let checks = run_probes(&state).await;
    rally_web::handlers::readiness_response(HealthReport::new(checks))
}

async fn run_probes(state: &AppState) -> Vec<HealthCheck> {
    let mut checks = Vec::with_capacity(state.probes.len());
    for probe in state.probes.iter() {
        checks.push(probe.check().await);
    }
    checks
}

/// Prometheus scrape endpoint.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics.render())
}
