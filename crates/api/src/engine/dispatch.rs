//! The task dispatcher: validate, persist, submit, acknowledge.
//!
//! Preconditions are checked before any persistence, so a rejected dispatch
//! leaves no trace. Once the PENDING record exists the two-phase handshake
//! runs: advance to SUBMITTED, call the substrate, persist the returned
//! external id (ACKNOWLEDGED). A crash inside that window leaves a record
//! the health monitor recognizes and reconciles.

use sortia_core::error::CoreError;
use sortia_core::settings::SettingsSnapshot;
use sortia_core::task::RunTaskType;
use sortia_core::types::{DbId, TaskId};
use sortia_db::models::selection_run::NewSelectionRun;
use sortia_db::repositories::{AssemblyRepo, SelectionRunRepo};
use sortia_queue::{JobDescriptor, RunParams, TaskQueue};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// One dispatch request, after DTO-level validation.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest {
    pub assembly_id: DbId,
    pub actor_id: DbId,
    pub task_type: RunTaskType,
    /// Required for select workflows, ignored otherwise.
    pub target_count: Option<u32>,
}

/// Validate preconditions, persist a PENDING record with a settings
/// snapshot, submit the self-contained descriptor, and persist the
/// substrate's id. Returns the internal task id; callers never see the
/// external one.
pub async fn dispatch_run(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    request: DispatchRequest,
) -> AppResult<TaskId> {
    // --- Preconditions, before any persistence ---
    let assembly = AssemblyRepo::find_by_id(pool, request.assembly_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Assembly",
            id: request.assembly_id,
        }))?;

    if !AssemblyRepo::can_manage(pool, request.actor_id, assembly.id).await? {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot manage selection runs on this assembly".to_string(),
        )));
    }

    let settings_value = assembly.source_settings.as_ref().ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Assembly has no source spreadsheet configured".to_string(),
        ))
    })?;
    let snapshot = SettingsSnapshot::from_value(settings_value).map_err(AppError::Core)?;

    let target_count = if request.task_type.requires_target_count() {
        match request.target_count {
            Some(count) if count > 0 => Some(count),
            _ => {
                return Err(AppError::Core(CoreError::InvalidSelection(
                    "A positive target count is required for selection runs".to_string(),
                )));
            }
        }
    } else {
        None
    };

    // --- Persist, then the two-phase handshake with the substrate ---
    let record = SelectionRunRepo::create(
        pool,
        &NewSelectionRun {
            assembly_id: assembly.id,
            user_id: request.actor_id,
            task_type: request.task_type,
            settings_used: snapshot.to_value(),
        },
    )
    .await?;

    let descriptor = JobDescriptor {
        task_id: record.task_id,
        task_type: request.task_type,
        assembly_id: assembly.id,
        user_id: request.actor_id,
        settings: snapshot,
        params: RunParams { target_count },
    };

    SelectionRunRepo::mark_submitted(pool, record.task_id).await?;

    let external_job_id = match queue.submit(&descriptor).await {
        Ok(id) => id,
        Err(e) => {
            // The record is the audit trail of the failed attempt.
            let message = format!("Could not submit the run to the queue: {e}");
            SelectionRunRepo::fail(pool, record.task_id, &message).await?;
            tracing::error!(
                task_id = %record.task_id,
                error = %e,
                "Run submission to the queue failed",
            );
            return Err(AppError::InternalError(message));
        }
    };

    if !SelectionRunRepo::acknowledge(pool, record.task_id, external_job_id).await? {
        tracing::warn!(
            task_id = %record.task_id,
            "External id was already recorded for this run",
        );
    }

    tracing::info!(
        task_id = %record.task_id,
        assembly_id = assembly.id,
        task_type = %request.task_type,
        user_id = request.actor_id,
        "Run dispatched",
    );

    Ok(record.task_id)
}
