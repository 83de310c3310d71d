//! Liveness endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/health
///
/// Round-trips the database so orchestration notices a wedged pool.
pub async fn health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    sortia_db::health_check(&state.pool).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
