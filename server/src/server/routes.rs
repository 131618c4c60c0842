//! Router configuration for the Rally server.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::events;
use axum::{
    routing::{get, post},
    Router,
};
use rally_web::{correlation_id_layer, handlers::realtime};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - Health, readiness and metrics (no authentication)
/// - Event endpoints under `/api`
/// - The realtime channel at `/api/ws`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/join", post(events::join_event))
        .route("/events/:id/leave", post(events::leave_event))
        .route("/ws", get(realtime::handle));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
