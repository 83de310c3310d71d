//! Shared helpers for API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sortia_api::config::ServerConfig;
use sortia_api::router::build_router;
use sortia_api::state::AppState;
use sortia_queue::pg::PgTaskQueue;
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        health_sweep_interval_secs: 60,
    }
}

/// Build the full application router with all middleware layers, backed by
/// the real Postgres queue substrate, so integration tests exercise the
/// same stack production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(test_config()),
        queue: Arc::new(PgTaskQueue::new(pool)),
    };
    build_router(state)
}

/// Seed an assembly; `with_settings` controls whether the source
/// spreadsheet is configured.
pub async fn seed_assembly(pool: &PgPool, with_settings: bool) -> i64 {
    let settings = with_settings.then(|| {
        serde_json::json!({
            "spreadsheet_id": "sheet-1",
            "criteria_tab": "Categories",
            "roster_tab": "Respondents",
            "already_selected_tab": null,
            "output_tab_prefix": "Selected",
            "id_column": "id",
            "address_columns": [],
            "check_same_address": false,
            "service_account": "runs@example-project.iam.gserviceaccount.com"
        })
    });
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO assemblies (title, source_settings) VALUES ($1, $2) RETURNING id",
    )
    .bind("Test assembly")
    .bind(settings)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Grant the manage capability on an assembly.
pub async fn seed_manager(pool: &PgPool, assembly_id: i64, user_id: i64) {
    sqlx::query("INSERT INTO assembly_managers (assembly_id, user_id) VALUES ($1, $2)")
        .bind(assembly_id)
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Issue a request and decode the JSON response body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    actor_id: Option<i64>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor_id) = actor_id {
        builder = builder.header("X-Actor-Id", actor_id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
