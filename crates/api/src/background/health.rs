//! The health monitor: reconciles persisted records against the
//! substrate's live view and force-fails orphaned runs.
//!
//! Runs as a periodic sweep on a fixed interval, independent of any
//! request; the polling endpoint also invokes [`check`] for the one record
//! being polled. Both paths are idempotent: force-fail goes through the
//! terminal-guarded update, so re-running with no state change fails
//! nothing further.

use std::time::Duration;

use chrono::Utc;
use sortia_core::types::TaskId;
use sortia_db::models::selection_run::SelectionRunRecord;
use sortia_db::models::status::SubmissionPhase;
use sortia_db::repositories::SelectionRunRepo;
use sortia_queue::TaskQueue;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

/// Grace period before a record that never reached ACKNOWLEDGED is
/// considered orphaned. Generous enough to cover a slow submit.
pub const NEVER_ACKNOWLEDGED_GRACE_SECS: i64 = 120;

/// Message written onto records whose executing process died.
const CRASH_MESSAGE: &str =
    "The background process running this task stopped without reporting; \
     the run was marked failed by the health check";

/// Message written onto records stuck in the dispatch crash window.
const NEVER_ACKNOWLEDGED_MESSAGE: &str =
    "The run was never handed to the background queue; \
     the run was marked failed by the health check";

/// Tally of one sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub checked: usize,
    pub force_failed: usize,
    pub errors: usize,
}

/// Reconcile one record by task id. Returns `true` if it was force-failed.
///
/// Missing and terminal records are no-ops.
pub async fn check(pool: &PgPool, queue: &dyn TaskQueue, task_id: TaskId) -> AppResult<bool> {
    let Some(record) = SelectionRunRepo::find_by_task_id(pool, task_id).await? else {
        return Ok(false);
    };
    check_record(pool, queue, &record).await
}

/// Reconcile an already-loaded record.
async fn check_record(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    record: &SelectionRunRecord,
) -> AppResult<bool> {
    if record.is_terminal() {
        return Ok(false);
    }

    let Some(external_job_id) = record.external_job_id else {
        // Still inside the persist -> submit -> acknowledge window. Only
        // reconcile once the grace period has clearly passed.
        let age_secs = (Utc::now() - record.created_at).num_seconds();
        let acknowledged = record.submission_phase == SubmissionPhase::Acknowledged.id();
        if !acknowledged && age_secs > NEVER_ACKNOWLEDGED_GRACE_SECS {
            let failed =
                SelectionRunRepo::fail(pool, record.task_id, NEVER_ACKNOWLEDGED_MESSAGE).await?;
            if failed {
                tracing::warn!(
                    task_id = %record.task_id,
                    age_secs,
                    "Force-failed run that was never acknowledged by the queue",
                );
            }
            return Ok(failed);
        }
        return Ok(false);
    };

    match queue.get_state(external_job_id).await? {
        // The substrate is still responsible for the job; leave it alone.
        state if state.is_active() => Ok(false),
        state => {
            let failed = SelectionRunRepo::fail(pool, record.task_id, CRASH_MESSAGE).await?;
            if failed {
                tracing::warn!(
                    task_id = %record.task_id,
                    external_job_id = %external_job_id,
                    substrate_state = ?state,
                    "Force-failed orphaned run",
                );
            }
            Ok(failed)
        }
    }
}

/// One full sweep over all non-terminal records.
pub async fn sweep(pool: &PgPool, queue: &dyn TaskQueue) -> SweepStats {
    let mut stats = SweepStats::default();

    let records = match SelectionRunRepo::list_active(pool).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "Health sweep could not list active runs");
            stats.errors += 1;
            return stats;
        }
    };

    for record in &records {
        stats.checked += 1;
        match check_record(pool, queue, record).await {
            Ok(true) => stats.force_failed += 1,
            Ok(false) => {}
            Err(e) => {
                stats.errors += 1;
                tracing::error!(
                    task_id = %record.task_id,
                    error = %e,
                    "Health check failed for run",
                );
            }
        }
    }

    stats
}

/// Run the sweep loop until the cancellation token is triggered.
pub async fn run(
    pool: PgPool,
    queue: std::sync::Arc<dyn TaskQueue>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Health monitor started"
    );
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Health monitor stopping");
                break;
            }
            _ = ticker.tick() => {
                let stats = sweep(&pool, queue.as_ref()).await;
                if stats.force_failed > 0 || stats.errors > 0 {
                    tracing::info!(
                        checked = stats.checked,
                        force_failed = stats.force_failed,
                        errors = stats.errors,
                        "Health sweep finished",
                    );
                } else {
                    tracing::debug!(checked = stats.checked, "Health sweep finished");
                }
            }
        }
    }
}
