use std::sync::Arc;

use sortia_sheets::client::{SheetsClient, SheetsConfig};
use sortia_stratify::{StratifyClient, StratifyConfig};
use sortia_worker::runtime::WorkerRuntime;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sortia_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sortia_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    sortia_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let worker_name = std::env::var("WORKER_NAME").unwrap_or_else(|_| {
        format!("worker-{}", std::process::id())
    });

    let sheets = SheetsClient::new(SheetsConfig::from_env());
    let stratifier = Arc::new(StratifyClient::new(StratifyConfig::from_env()));

    let runtime = WorkerRuntime::register(pool, &worker_name, sheets, stratifier)
        .await
        .expect("Failed to register worker");

    let cancel = CancellationToken::new();
    let heartbeat = runtime.spawn_heartbeat(cancel.clone());

    let loop_cancel = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
        tracing::info!("Shutdown signal received");
        loop_cancel.cancel();
    });

    runtime.run(cancel).await;

    let _ = heartbeat.await;
    ctrl_c.abort();
    tracing::info!("Worker stopped");
}
