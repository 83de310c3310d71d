//! The pipeline driver and its panic boundary.
//!
//! `execute_job` owns the terminal write for the record: whatever happens
//! inside the stages (validation failure, transport failure, or a panic),
//! the record ends COMPLETED or FAILED. The only escape is a hard process
//! kill, which the health monitor reconciles from the outside.

use futures::FutureExt;
use sortia_core::outcome::RunOutcome;
use sortia_core::report::{ReportEntry, Severity};
use sortia_core::task::RunTaskType;
use sortia_db::repositories::SelectionRunRepo;
use sortia_queue::JobDescriptor;
use sortia_sheets::source::DataSource;
use sortia_stratify::Stratifier;
use sqlx::PgPool;

use crate::error::StageError;
use crate::progress::ProgressSink;
use crate::stages;

/// Which stage writes the terminal state, per task type.
///
/// Exhaustive on purpose: adding a task type without deciding its
/// finalization point must not compile. Getting this wrong silently turns
/// a crash into the wrong failure mode (stuck-RUNNING vs. false COMPLETED).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStage {
    Load,
    Select,
    Write,
    Tabs,
}

impl FinalStage {
    pub fn for_task_type(task_type: RunTaskType) -> Self {
        match task_type {
            RunTaskType::Load | RunTaskType::LoadReplacement => FinalStage::Load,
            RunTaskType::TestSelect => FinalStage::Select,
            RunTaskType::Select | RunTaskType::SelectReplacement => FinalStage::Write,
            RunTaskType::ListOldTabs | RunTaskType::DeleteOldTabs => FinalStage::Tabs,
        }
    }
}

/// What the worker writes back to the queue substrate.
#[derive(Debug)]
pub enum ExecutionResult {
    /// The run completed; the payload is the task-type-tagged outcome.
    Succeeded(serde_json::Value),
    /// The run failed; the record already carries the message and report.
    Failed(String),
}

/// Collaborators for one job execution, built from the job's settings
/// snapshot by the worker.
pub struct JobContext<'a> {
    pub pool: &'a PgPool,
    pub descriptor: &'a JobDescriptor,
    pub source: &'a dyn DataSource,
    pub stratifier: &'a dyn Stratifier,
    pub sink: &'a dyn ProgressSink,
}

/// Drive one claimed job to a terminal state.
pub async fn execute_job(ctx: JobContext<'_>) -> ExecutionResult {
    let task_id = ctx.descriptor.task_id;

    if let Err(e) = SelectionRunRepo::mark_running(ctx.pool, task_id).await {
        tracing::error!(task_id = %task_id, error = %e, "Failed to mark run as running");
    }

    // The boundary: stage errors come back as `Ok(Err(_))`, panics as
    // `Err(_)`. Both end in a terminal FAILED write.
    let outcome = std::panic::AssertUnwindSafe(run_stages(&ctx))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(run_outcome)) => {
            let payload =
                serde_json::to_value(&run_outcome).expect("outcome serialization cannot fail");
            tracing::info!(
                task_id = %task_id,
                task_type = %ctx.descriptor.task_type,
                "Run completed",
            );
            ExecutionResult::Succeeded(payload)
        }
        Ok(Err(stage_error)) => {
            let message = stage_error.user_message(&ctx.descriptor.settings.service_account);
            append_error_entries(
                ctx.pool,
                task_id,
                &[ReportEntry {
                    severity: Severity::Error,
                    message: format!("{stage_error:?}"),
                }],
            )
            .await;
            fail_record(ctx.pool, task_id, &message).await;
            tracing::warn!(
                task_id = %task_id,
                task_type = %ctx.descriptor.task_type,
                error = %message,
                "Run failed",
            );
            ExecutionResult::Failed(message)
        }
        Err(panic) => {
            let payload = panic_message(panic.as_ref());
            let backtrace = std::backtrace::Backtrace::force_capture();
            append_error_entries(
                ctx.pool,
                task_id,
                &[
                    ReportEntry {
                        severity: Severity::Error,
                        message: format!("Unhandled crash in pipeline: {payload}"),
                    },
                    ReportEntry {
                        severity: Severity::Error,
                        message: backtrace.to_string(),
                    },
                ],
            )
            .await;
            let message = "Internal error while running the task".to_string();
            fail_record(ctx.pool, task_id, &message).await;
            tracing::error!(
                task_id = %task_id,
                panic = %payload,
                "Run panicked; record force-written to failed",
            );
            ExecutionResult::Failed(message)
        }
    }
}

/// Compose the stages for the descriptor's task type. Intermediate stages
/// leave the record RUNNING; the final stage's completion is written here,
/// exactly once.
async fn run_stages(ctx: &JobContext<'_>) -> Result<RunOutcome, StageError> {
    let descriptor = ctx.descriptor;
    let task_type = descriptor.task_type;
    let final_stage = FinalStage::for_task_type(task_type);

    if final_stage == FinalStage::Tabs {
        let dry_run = task_type == RunTaskType::ListOldTabs;
        let tabs = stages::manage_tabs(ctx.pool, descriptor, dry_run, ctx.source, ctx.sink).await?;
        let outcome = RunOutcome::Tabs {
            tab_names: tabs,
            deleted: !dry_run,
        };
        complete_record(ctx.pool, descriptor, None).await;
        return Ok(outcome);
    }

    let loaded = stages::load(ctx.pool, descriptor, ctx.source, ctx.sink).await?;

    if final_stage == FinalStage::Load {
        let outcome = RunOutcome::Load {
            people_loaded: loaded.roster.len(),
            already_selected_loaded: loaded.already_selected.len(),
            categories: loaded
                .criteria
                .categories
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            min_selectable: loaded.min_selectable,
            max_selectable: loaded.max_selectable,
        };
        complete_record(ctx.pool, descriptor, None).await;
        return Ok(outcome);
    }

    // LOAD was intermediate: the record stays RUNNING with no completion
    // timestamp until the final stage below.
    let (panel, candidate_count) =
        stages::select(ctx.pool, descriptor, &loaded, ctx.stratifier, ctx.sink).await?;
    let panels_value = serde_json::json!([panel.members]);

    if final_stage == FinalStage::Write {
        stages::write(ctx.pool, descriptor, &loaded, &panel, ctx.source, ctx.sink).await?;
    }

    let outcome = RunOutcome::Select {
        panels: vec![panel.members.clone()],
        candidate_count,
        test_mode: final_stage == FinalStage::Select,
    };
    complete_record(ctx.pool, descriptor, Some(&panels_value)).await;
    Ok(outcome)
}

async fn complete_record(
    pool: &PgPool,
    descriptor: &JobDescriptor,
    panels: Option<&serde_json::Value>,
) {
    match SelectionRunRepo::complete(pool, descriptor.task_id, panels).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                task_id = %descriptor.task_id,
                "Completion skipped: record was already terminal",
            );
        }
        Err(e) => {
            tracing::error!(
                task_id = %descriptor.task_id,
                error = %e,
                "Failed to write completion to run record",
            );
        }
    }
}

async fn fail_record(pool: &PgPool, task_id: sortia_core::types::TaskId, message: &str) {
    match SelectionRunRepo::fail(pool, task_id, message).await {
        Ok(_) => {}
        Err(e) => {
            tracing::error!(
                task_id = %task_id,
                error = %e,
                "Failed to write failure to run record",
            );
        }
    }
}

async fn append_error_entries(
    pool: &PgPool,
    task_id: sortia_core::types::TaskId,
    entries: &[ReportEntry],
) {
    let value = serde_json::to_value(entries).expect("report serialization cannot fail");
    if let Err(e) = SelectionRunRepo::append_report_entries(pool, task_id, &value).await {
        tracing::error!(
            task_id = %task_id,
            error = %e,
            "Failed to append failure diagnostics to run record",
        );
    }
}

/// Best-effort panic payload rendering (payloads are almost always `&str`
/// or `String`).
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalization_policy_matches_task_types() {
        assert_eq!(FinalStage::for_task_type(RunTaskType::Load), FinalStage::Load);
        assert_eq!(
            FinalStage::for_task_type(RunTaskType::LoadReplacement),
            FinalStage::Load
        );
        assert_eq!(
            FinalStage::for_task_type(RunTaskType::TestSelect),
            FinalStage::Select
        );
        assert_eq!(FinalStage::for_task_type(RunTaskType::Select), FinalStage::Write);
        assert_eq!(
            FinalStage::for_task_type(RunTaskType::SelectReplacement),
            FinalStage::Write
        );
        assert_eq!(
            FinalStage::for_task_type(RunTaskType::ListOldTabs),
            FinalStage::Tabs
        );
        assert_eq!(
            FinalStage::for_task_type(RunTaskType::DeleteOldTabs),
            FinalStage::Tabs
        );
    }
}
