//! Selection-run record entity: the durable state machine for one
//! submitted background job.

use serde::Serialize;
use sortia_core::task::RunTaskType;
use sortia_core::types::{DbId, ExternalJobId, TaskId, Timestamp};
use sqlx::FromRow;

use super::status::{RunStatus, StatusId};

/// A row from the `selection_runs` table.
///
/// `log_messages` is a JSONB array of strings, `settings_used` the immutable
/// snapshot taken at dispatch, `run_report` a `{ "entries": [...] }`
/// document, and `selected_panels` (when present) a list of panels, each a
/// list of distinct person ids.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SelectionRunRecord {
    pub task_id: TaskId,
    pub external_job_id: Option<ExternalJobId>,
    pub submission_phase: StatusId,
    pub assembly_id: DbId,
    pub task_type: String,
    pub status_id: StatusId,
    pub log_messages: serde_json::Value,
    pub settings_used: serde_json::Value,
    pub error_message: Option<String>,
    pub selected_panels: Option<serde_json::Value>,
    pub run_report: serde_json::Value,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub user_id: DbId,
}

impl SelectionRunRecord {
    /// Typed task type. A record with an unknown name is a programming
    /// defect (the column is only ever written from [`RunTaskType::as_str`]).
    pub fn task_type(&self) -> Result<RunTaskType, sortia_core::error::CoreError> {
        RunTaskType::parse(&self.task_type)
    }

    pub fn status(&self) -> Option<RunStatus> {
        RunStatus::from_id(self.status_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(RunStatus::is_terminal)
    }

    /// Log lines as plain strings, tolerating nothing else in the array.
    pub fn log_lines(&self) -> Vec<String> {
        self.log_messages
            .as_array()
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Insert payload for a new run record.
#[derive(Debug, Clone)]
pub struct NewSelectionRun {
    pub assembly_id: DbId,
    pub user_id: DbId,
    pub task_type: RunTaskType,
    pub settings_used: serde_json::Value,
}
