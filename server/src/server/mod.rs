//! HTTP server wiring: state, routes and operational endpoints.

pub mod health;
pub mod routes;
pub mod state;

pub use health::ReadinessProbe;
pub use routes::build_router;
pub use state::AppState;
