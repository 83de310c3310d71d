//! Router and middleware assembly.
//!
//! Built here (not in `main`) so integration tests exercise exactly the
//! middleware stack production uses: CORS, request ids, timeout, tracing,
//! panic recovery.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::extract::ACTOR_ID_HEADER;
use crate::handlers;
use crate::state::AppState;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Build the full application router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state);

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/assemblies/{id}/runs", get(handlers::runs::list_runs))
        .route(
            "/assemblies/{id}/runs/load",
            post(handlers::runs::submit_load),
        )
        .route(
            "/assemblies/{id}/runs/select",
            post(handlers::runs::submit_select),
        )
        .route(
            "/assemblies/{id}/runs/test-select",
            post(handlers::runs::submit_test_select),
        )
        .route(
            "/assemblies/{id}/runs/replacement-load",
            post(handlers::runs::submit_replacement_load),
        )
        .route(
            "/assemblies/{id}/runs/replacement-select",
            post(handlers::runs::submit_replacement_select),
        )
        .route(
            "/assemblies/{id}/runs/tabs/list",
            post(handlers::runs::submit_list_old_tabs),
        )
        .route(
            "/assemblies/{id}/runs/tabs/delete",
            post(handlers::runs::submit_delete_old_tabs),
        )
        .route("/runs/{task_id}", get(handlers::runs::get_run_status))
        .route("/runs/{task_id}/poll", get(handlers::runs::poll_run_status));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .nest("/api/v1", api)
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(ACTOR_ID_HEADER),
        ])
        .allow_credentials(true)
}
