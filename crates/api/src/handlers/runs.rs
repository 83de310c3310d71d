//! Handlers for dispatching selection runs and polling their status.
//!
//! One submit endpoint per workflow; all of them delegate to the
//! dispatcher and return only the internal task id. Polling clients use
//! the poll endpoint, which reconciles the record against the substrate
//! before aggregating.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use sortia_core::error::CoreError;
use sortia_core::task::RunTaskType;
use sortia_core::types::{DbId, TaskId};
use sortia_db::repositories::{AssemblyRepo, SelectionRunRepo};
use validator::Validate;

use crate::background::health;
use crate::engine::dispatch::{dispatch_run, DispatchRequest};
use crate::engine::status::get_status;
use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for the select/test-select/replacement-select endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitSelectionRequest {
    /// Requested panel size.
    #[validate(range(min = 1, message = "target_count must be at least 1"))]
    pub target_count: u32,
}

/// Response for every submit endpoint.
#[derive(Debug, Serialize)]
pub struct SubmittedRun {
    pub task_id: TaskId,
}

// ---------------------------------------------------------------------------
// Shared dispatch plumbing
// ---------------------------------------------------------------------------

async fn submit(
    state: &AppState,
    actor: Actor,
    assembly_id: DbId,
    task_type: RunTaskType,
    target_count: Option<u32>,
) -> AppResult<(StatusCode, Json<DataResponse<SubmittedRun>>)> {
    let task_id = dispatch_run(
        &state.pool,
        state.queue.as_ref(),
        DispatchRequest {
            assembly_id,
            actor_id: actor.user_id,
            task_type,
            target_count,
        },
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedRun { task_id },
        }),
    ))
}

fn validate_body(body: &SubmitSelectionRequest) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Submit endpoints, one per workflow
// ---------------------------------------------------------------------------

/// POST /api/v1/assemblies/{id}/runs/load
pub async fn submit_load(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    submit(&state, actor, assembly_id, RunTaskType::Load, None).await
}

/// POST /api/v1/assemblies/{id}/runs/select
pub async fn submit_select(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
    Json(body): Json<SubmitSelectionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_body(&body)?;
    submit(
        &state,
        actor,
        assembly_id,
        RunTaskType::Select,
        Some(body.target_count),
    )
    .await
}

/// POST /api/v1/assemblies/{id}/runs/test-select
pub async fn submit_test_select(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
    Json(body): Json<SubmitSelectionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_body(&body)?;
    submit(
        &state,
        actor,
        assembly_id,
        RunTaskType::TestSelect,
        Some(body.target_count),
    )
    .await
}

/// POST /api/v1/assemblies/{id}/runs/replacement-load
pub async fn submit_replacement_load(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    submit(&state, actor, assembly_id, RunTaskType::LoadReplacement, None).await
}

/// POST /api/v1/assemblies/{id}/runs/replacement-select
pub async fn submit_replacement_select(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
    Json(body): Json<SubmitSelectionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_body(&body)?;
    submit(
        &state,
        actor,
        assembly_id,
        RunTaskType::SelectReplacement,
        Some(body.target_count),
    )
    .await
}

/// POST /api/v1/assemblies/{id}/runs/tabs/list
pub async fn submit_list_old_tabs(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    submit(&state, actor, assembly_id, RunTaskType::ListOldTabs, None).await
}

/// POST /api/v1/assemblies/{id}/runs/tabs/delete
pub async fn submit_delete_old_tabs(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    submit(&state, actor, assembly_id, RunTaskType::DeleteOldTabs, None).await
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

/// GET /api/v1/assemblies/{id}/runs
///
/// Recent runs for an assembly, newest first. Requires the manage
/// capability, like the dispatch endpoints.
pub async fn list_runs(
    actor: Actor,
    State(state): State<AppState>,
    Path(assembly_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let assembly = AssemblyRepo::find_by_id(&state.pool, assembly_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Assembly",
            id: assembly_id,
        }))?;
    if !AssemblyRepo::can_manage(&state.pool, actor.user_id, assembly.id).await? {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view selection runs on this assembly".to_string(),
        )));
    }

    let runs = SelectionRunRepo::list_by_assembly(&state.pool, assembly.id, 50).await?;
    Ok(Json(DataResponse { data: runs }))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/runs/{task_id}
///
/// Aggregated status without reconciliation.
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    let view = get_status(&state.pool, state.queue.as_ref(), task_id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// GET /api/v1/runs/{task_id}/poll
///
/// The polling endpoint: reconcile the record against the substrate first
/// (force-failing it if its process died), then aggregate.
pub async fn poll_run_status(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    health::check(&state.pool, state.queue.as_ref(), task_id).await?;
    let view = get_status(&state.pool, state.queue.as_ref(), task_id).await?;
    Ok(Json(DataResponse { data: view }))
}
