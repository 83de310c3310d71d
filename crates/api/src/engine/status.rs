//! The status aggregator: persisted record + live substrate view, merged
//! into one read model for polling clients.

use serde::Serialize;
use sortia_core::outcome::RunOutcome;
use sortia_core::types::{TaskId, Timestamp};
use sortia_db::models::selection_run::SelectionRunRecord;
use sortia_db::models::status::RunStatus;
use sortia_db::repositories::SelectionRunRepo;
use sortia_queue::{JobState, TaskQueue};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// What polling clients see for one task id.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub task_id: TaskId,
    /// False when no record exists; every other field is then empty.
    pub found: bool,
    pub task_type: Option<String>,
    pub status: Option<&'static str>,
    pub log_messages: Vec<String>,
    pub error_message: Option<String>,
    pub report: Option<serde_json::Value>,
    /// Decoded terminal payload once the substrate reports success.
    pub outcome: Option<RunOutcome>,
    /// Partial progress lines the substrate holds while the job runs.
    pub substrate_progress: Vec<String>,
    pub created_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl StatusView {
    fn not_found(task_id: TaskId) -> Self {
        Self {
            task_id,
            found: false,
            task_type: None,
            status: None,
            log_messages: Vec::new(),
            error_message: None,
            report: None,
            outcome: None,
            substrate_progress: Vec::new(),
            created_at: None,
            completed_at: None,
        }
    }

    fn from_record(record: &SelectionRunRecord) -> Self {
        Self {
            task_id: record.task_id,
            found: true,
            task_type: Some(record.task_type.clone()),
            status: record.status().map(RunStatus::as_str),
            log_messages: record.log_lines(),
            error_message: record.error_message.clone(),
            report: Some(record.run_report.clone()),
            outcome: None,
            substrate_progress: Vec::new(),
            created_at: Some(record.created_at),
            completed_at: record.completed_at,
        }
    }
}

/// Merge the persisted record with the substrate's live view.
///
/// Tolerates a missing record (empty view) and a job the substrate does
/// not know yet (persisted view only). A result payload whose shape does
/// not match the record's task type is a programming defect and surfaces
/// as an internal error, never as user-facing status.
pub async fn get_status(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    task_id: TaskId,
) -> AppResult<StatusView> {
    let Some(record) = SelectionRunRepo::find_by_task_id(pool, task_id).await? else {
        return Ok(StatusView::not_found(task_id));
    };

    let mut view = StatusView::from_record(&record);

    let Some(external_job_id) = record.external_job_id else {
        return Ok(view);
    };

    match queue.get_state(external_job_id).await? {
        JobState::Succeeded => {
            if let Some(payload) = queue.get_result(external_job_id).await? {
                let outcome: RunOutcome = serde_json::from_value(payload).map_err(|e| {
                    AppError::InternalError(format!(
                        "Result payload for task {task_id} does not decode: {e}"
                    ))
                })?;
                let task_type = record.task_type().map_err(AppError::Core)?;
                if !outcome.matches_task_type(task_type) {
                    return Err(AppError::InternalError(format!(
                        "Result payload shape does not match task type {task_type}"
                    )));
                }
                view.outcome = Some(outcome);
            }
        }
        JobState::Pending | JobState::Running => {
            view.substrate_progress = queue.get_progress(external_job_id).await?;
        }
        // Failed/unknown jobs carry nothing beyond the persisted record;
        // the health monitor owns reconciling the record itself.
        JobState::Failed | JobState::Unknown => {}
    }

    Ok(view)
}
