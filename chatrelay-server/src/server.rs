use axum::{Router, middleware, routing::get, serve};
use shared::config::server::{Config, DatabaseConfig, LogFormat};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::app_state::AppState;
use crate::handlers;
use crate::log::{EventLog, LogError, memory::MemoryEventLog};
use crate::middleware::session_middleware;
use crate::routes;
use crate::services::fanout::LiveFanout;
use crate::services::history_writer::HistoryWriter;
use crate::store::{HistoryStore, postgres::PgHistoryStore};

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a database connection pool for the history store.
///
/// # Errors
/// Returns an error if the database connection pool cannot be created.
pub async fn create_database_pool(db: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.url)
        .await
}

/// Creates the room-scoped API routes. Every route requires a session.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}", get(handlers::history::get_history))
        .route("/{room_id}/send", get(handlers::send::send_socket))
        .route("/{room_id}/live", get(handlers::live::live_socket))
        .route_layer(middleware::from_fn(session_middleware))
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(state: AppState) -> Router {
    create_api_router()
        .merge(routes::health::create_health_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Spawns the log-consuming pipeline stages.
pub fn spawn_pipeline(
    log: Arc<dyn EventLog>,
    store: Arc<dyn HistoryStore>,
    fanout: Arc<LiveFanout>,
    shutdown: &CancellationToken,
) -> Vec<(&'static str, JoinHandle<Result<(), LogError>>)> {
    let writer = Arc::new(HistoryWriter::new(log.clone(), store));
    vec![
        (
            "live fan-out",
            tokio::spawn(fanout.run(log, shutdown.clone())),
        ),
        ("history writer", tokio::spawn(writer.run(shutdown.clone()))),
    ]
}

/// Creates the graceful shutdown signal handler.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the relay and binds it to the configured port.
///
/// # Errors
/// Returns an error if the database is unreachable, the pipeline cannot
/// subscribe, or the server fails to start.
pub async fn run(config: Config) -> anyhow::Result<()> {
    initialize_tracing(&config);
    info!("Starting chat relay...");

    let pool = create_database_pool(&config.db).await?;
    let pg_store = PgHistoryStore::new(pool);
    pg_store.ensure_schema().await?;

    let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
    let store: Arc<dyn HistoryStore> = Arc::new(pg_store);
    let fanout = Arc::new(LiveFanout::new(config.stream.viewer_queue_capacity));
    let state = AppState::new(log.clone(), store.clone(), fanout.clone());

    let shutdown = CancellationToken::new();
    let pipeline = spawn_pipeline(log, store, fanout, &shutdown);

    let app = create_app_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    // Give in-flight pipeline work a bounded window to flush.
    shutdown.cancel();
    let drain = Duration::from_secs(config.server.shutdown_timeout_secs);
    for (name, task) in pipeline {
        match tokio::time::timeout(drain, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(stage = name, error = %err, "pipeline stage failed"),
            Ok(Err(err)) => warn!(stage = name, error = %err, "pipeline stage panicked"),
            Err(_) => warn!(stage = name, "pipeline stage did not stop in time"),
        }
    }

    Ok(())
}
