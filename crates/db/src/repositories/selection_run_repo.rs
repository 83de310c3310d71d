//! Repository for the `selection_runs` table.
//!
//! Every status transition is guarded in SQL: terminal rows match no
//! `WHERE` clause, so an illegal transition affects zero rows instead of
//! corrupting the state machine. Records are never deleted.

use sortia_core::types::{DbId, ExternalJobId, TaskId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::selection_run::{NewSelectionRun, SelectionRunRecord};
use crate::models::status::{RunStatus, StatusId, SubmissionPhase};

/// Column list for `selection_runs` queries.
const COLUMNS: &str = "\
    task_id, external_job_id, submission_phase, assembly_id, task_type, \
    status_id, log_messages, settings_used, error_message, selected_panels, \
    run_report, created_at, completed_at, user_id";

/// Terminal statuses: completed, failed.
const TERMINAL_STATUSES: [StatusId; 2] = [
    RunStatus::Completed as StatusId,
    RunStatus::Failed as StatusId,
];

/// Provides state-machine operations for selection-run records.
pub struct SelectionRunRepo;

impl SelectionRunRepo {
    /// Persist a new PENDING record in submission phase CREATED.
    ///
    /// Mints the task id (UUID v7, time-ordered) here so the caller can
    /// hand it to polling clients before the substrate has acknowledged.
    pub async fn create(
        pool: &PgPool,
        input: &NewSelectionRun,
    ) -> Result<SelectionRunRecord, sqlx::Error> {
        let task_id: TaskId = Uuid::now_v7();
        let query = format!(
            "INSERT INTO selection_runs \
                 (task_id, submission_phase, assembly_id, task_type, status_id, \
                  log_messages, settings_used, run_report, user_id) \
             VALUES ($1, $2, $3, $4, $5, '[]'::jsonb, $6, '{{\"entries\":[]}}'::jsonb, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SelectionRunRecord>(&query)
            .bind(task_id)
            .bind(SubmissionPhase::Created.id())
            .bind(input.assembly_id)
            .bind(input.task_type.as_str())
            .bind(RunStatus::Pending.id())
            .bind(&input.settings_used)
            .bind(input.user_id)
            .fetch_one(pool)
            .await
    }

    /// Advance the submission phase to SUBMITTED just before the substrate
    /// call. A crash between this write and [`acknowledge`](Self::acknowledge)
    /// leaves a record the health monitor recognizes as orphaned.
    pub async fn mark_submitted(pool: &PgPool, task_id: TaskId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE selection_runs SET submission_phase = $2 \
             WHERE task_id = $1 AND submission_phase = $3",
        )
        .bind(task_id)
        .bind(SubmissionPhase::Submitted.id())
        .bind(SubmissionPhase::Created.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist the substrate-assigned job id, exactly once.
    ///
    /// Returns `false` if the record already carried an external id (the
    /// write is skipped rather than overwritten).
    pub async fn acknowledge(
        pool: &PgPool,
        task_id: TaskId,
        external_job_id: ExternalJobId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE selection_runs \
             SET external_job_id = $2, submission_phase = $3 \
             WHERE task_id = $1 AND external_job_id IS NULL",
        )
        .bind(task_id)
        .bind(external_job_id)
        .bind(SubmissionPhase::Acknowledged.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append one log line and force the status to RUNNING.
    ///
    /// No-op on terminal rows: the log of a finished run never grows.
    pub async fn append_log_line(
        pool: &PgPool,
        task_id: TaskId,
        line: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE selection_runs \
             SET log_messages = log_messages || $2::jsonb, status_id = $3 \
             WHERE task_id = $1 AND status_id NOT IN ($4, $5)",
        )
        .bind(task_id)
        .bind(serde_json::json!([line]))
        .bind(RunStatus::Running.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a pending record as RUNNING (executor picked it up).
    pub async fn mark_running(pool: &PgPool, task_id: TaskId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE selection_runs SET status_id = $2 \
             WHERE task_id = $1 AND status_id = $3",
        )
        .bind(task_id)
        .bind(RunStatus::Running.id())
        .bind(RunStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Append report entries (a JSONB array of `{severity, message}`
    /// objects) to the record's `run_report`, preserving stage order.
    pub async fn append_report_entries(
        pool: &PgPool,
        task_id: TaskId,
        entries: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE selection_runs \
             SET run_report = jsonb_set(run_report, '{entries}', \
                 (run_report->'entries') || $2::jsonb) \
             WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(entries)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize a record as COMPLETED, optionally persisting the selected
    /// panels. Guarded against terminal rows.
    pub async fn complete(
        pool: &PgPool,
        task_id: TaskId,
        selected_panels: Option<&serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE selection_runs \
             SET status_id = $2, selected_panels = COALESCE($3, selected_panels), \
                 completed_at = NOW() \
             WHERE task_id = $1 AND status_id NOT IN ($4, $5)",
        )
        .bind(task_id)
        .bind(RunStatus::Completed.id())
        .bind(selected_panels)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finalize a record as FAILED with a short user-facing message.
    ///
    /// Returns `false` when the record was already terminal; the caller
    /// (executor failure path or health monitor) relies on this for
    /// idempotence. The message is also appended to the log so polling
    /// clients see the failure inline with the progress lines.
    pub async fn fail(
        pool: &PgPool,
        task_id: TaskId,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE selection_runs \
             SET status_id = $2, error_message = $3, completed_at = NOW(), \
                 log_messages = log_messages || $4::jsonb \
             WHERE task_id = $1 AND status_id NOT IN ($5, $6)",
        )
        .bind(task_id)
        .bind(RunStatus::Failed.id())
        .bind(error_message)
        .bind(serde_json::json!([error_message]))
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a record by its task id.
    pub async fn find_by_task_id(
        pool: &PgPool,
        task_id: TaskId,
    ) -> Result<Option<SelectionRunRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM selection_runs WHERE task_id = $1");
        sqlx::query_as::<_, SelectionRunRecord>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// All non-terminal records, oldest first: the health sweep's working
    /// set.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<SelectionRunRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM selection_runs \
             WHERE status_id NOT IN ($1, $2) \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, SelectionRunRecord>(&query)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .fetch_all(pool)
            .await
    }

    /// Recent runs for one assembly, newest first (organizer history view).
    pub async fn list_by_assembly(
        pool: &PgPool,
        assembly_id: DbId,
        limit: i64,
    ) -> Result<Vec<SelectionRunRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM selection_runs \
             WHERE assembly_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, SelectionRunRecord>(&query)
            .bind(assembly_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
