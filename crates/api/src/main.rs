use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sortia_api::background::health;
use sortia_api::config::ServerConfig;
use sortia_api::router::build_router;
use sortia_api::state::AppState;
use sortia_queue::pg::PgTaskQueue;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sortia_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = sortia_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    sortia_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    sortia_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Queue substrate ---
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));

    // --- Shared state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        queue: queue.clone(),
    };

    // --- Health monitor ---
    let cancel = CancellationToken::new();
    let monitor_handle = tokio::spawn(health::run(
        pool.clone(),
        queue,
        Duration::from_secs(config.health_sweep_interval_secs),
        cancel.clone(),
    ));

    // --- Serve ---
    let app = build_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT combination");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Drain background tasks ---
    cancel.cancel();
    let _ = monitor_handle.await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");
    tracing::info!("Shutdown signal received");
}
