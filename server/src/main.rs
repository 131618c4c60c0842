//! Rally HTTP server.
//!
//! Event attendance with ownership-gated mutation and live updates.

use anyhow::Context;
use rally_auth::stores::RedisSessionStore;
use rally_auth::SessionTokenVerifier;
use rally_core::{AttendanceManager, SystemClock, TokenVerifier};
use rally_postgres::PostgresEventRepository;
use rally_runtime::metrics::MetricsRecorder;
use rally_runtime::{Broadcaster, EventService, RetryPolicy};
use rally_server::server::ReadinessProbe;
use rally_server::{build_router, AppState, Config};
use rally_web::Realtime;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local .env is optional
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rally=debug,sqlx=warn,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rally server");

    let config = Config::from_env();
    info!(
        bind = %config.bind_address(),
        redis = %config.redis.redacted_url(),
        ws_max_connections = config.server.ws_max_connections,
        "Configuration loaded"
    );

    let metrics = MetricsRecorder::install().context("Failed to install metrics recorder")?;

    // Event repository (write and read side)
    info!("Connecting to event database...");
    let repository = Arc::new(
        PostgresEventRepository::connect(
            &config.postgres.url,
            config.postgres.max_connections,
            config.postgres.min_connections,
            config.postgres.connect_timeout(),
        )
        .await
        .context("Failed to connect to PostgreSQL")?,
    );
    repository.migrate().await.context("Failed to run migrations")?;
    info!("Event database ready");

    // Session store and token verification
    info!("Connecting to session store...");
    let sessions = RedisSessionStore::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    let clock = Arc::new(SystemClock);
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(SessionTokenVerifier::new(sessions.clone(), clock.clone()));
    info!("Session store ready");

    // Attendance core
    let broadcaster = Broadcaster::new(config.server.ws_observer_buffer);
    let realtime = Realtime::new(broadcaster.subscriptions(), config.server.ws_max_connections);
    let attendance = AttendanceManager::new(repository.clone(), clock)
        .with_timeout(config.service.repository_timeout());
    let service = EventService::new(attendance, Arc::new(broadcaster)).with_read_retry(
        RetryPolicy::builder()
            .max_retries(config.service.read_retry_max)
            .initial_delay(config.service.read_retry_initial_delay())
            .build(),
    );

    let postgres_probe: Arc<dyn ReadinessProbe> = repository;
    let redis_probe: Arc<dyn ReadinessProbe> = Arc::new(sessions);
    let probes = vec![postgres_probe, redis_probe];
    let state = AppState::new(service, verifier, realtime, metrics).with_probes(probes);

    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    // Bound the drain once a signal has been received
    tokio::select! {
        result = server.into_future() => result.context("Server error")?,
        () = drain_deadline(shutdown_timeout) => {
            warn!(timeout_secs = shutdown_timeout.as_secs(), "Graceful shutdown timed out");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}

/// Resolves `timeout` after the first shutdown signal.
async fn drain_deadline(timeout: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(timeout).await;
}
