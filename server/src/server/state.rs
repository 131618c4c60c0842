//! Application state for the Rally HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers:
//! - Event Service (attendance changes and reads)
//! - Token verifier (bearer token → identity)
//! - Realtime endpoint state (observer registrations)
//! - Metrics recorder and readiness probes

use super::health::ReadinessProbe;
use axum::extract::FromRef;
use rally_core::TokenVerifier;
use rally_runtime::metrics::MetricsRecorder;
use rally_runtime::EventService;
use rally_web::Realtime;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via `Arc`) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Event Service for every event operation
    pub service: EventService,

    /// Resolves bearer tokens to identities
    pub verifier: Arc<dyn TokenVerifier>,

    /// Realtime channel state
    pub realtime: Realtime,

    /// Prometheus recorder rendered at `/metrics`
    pub metrics: MetricsRecorder,

    /// Dependencies checked by `/ready`
    pub probes: Arc<[Arc<dyn ReadinessProbe>]>,
}

impl AppState {
    /// Create a new application state with no readiness probes.
    #[must_use]
    pub fn new(
        service: EventService,
        verifier: Arc<dyn TokenVerifier>,
        realtime: Realtime,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            service,
            verifier,
            realtime,
            metrics,
            probes: Arc::from(Vec::new()),
        }
    }

    /// Replace the readiness probes.
    #[must_use]
    pub fn with_probes(mut self, probes: Vec<Arc<dyn ReadinessProbe>>) -> Self {
        self.probes = Arc::from(probes);
        self
    }
}

impl FromRef<AppState> for Arc<dyn TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.verifier)
    }
}

impl FromRef<AppState> for Realtime {
    fn from_ref(state: &AppState) -> Self {
        state.realtime.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("realtime", &self.realtime)
            .field("probes", &self.probes.len())
            .finish_non_exhaustive()
    }
}
