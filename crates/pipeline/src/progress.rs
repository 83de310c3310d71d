//! Progress sinks: the only channel for intermediate human-readable
//! progress.
//!
//! A sink is passed explicitly into every stage call and is scoped to the
//! one job being executed, so concurrent jobs in one process can never
//! cross-contaminate logs. The record-backed sink appends each line to the
//! run's `log_messages` immediately (forcing the status to RUNNING), so
//! polling clients see live progress before the job finishes.

use async_trait::async_trait;
use sortia_core::types::{ExternalJobId, TaskId};
use sortia_db::repositories::{QueueJobRepo, SelectionRunRepo};
use sqlx::PgPool;

/// Receives progress lines emitted during one job's execution.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, line: &str);
}

/// Appends every line to the executing job's run record.
///
/// A failed append is logged and dropped rather than propagated: losing
/// one progress line must not fail the run itself.
pub struct RecordSink {
    pool: PgPool,
    task_id: TaskId,
}

impl RecordSink {
    pub fn new(pool: PgPool, task_id: TaskId) -> Self {
        Self { pool, task_id }
    }
}

#[async_trait]
impl ProgressSink for RecordSink {
    async fn emit(&self, line: &str) {
        if let Err(e) = SelectionRunRepo::append_log_line(&self.pool, self.task_id, line).await {
            tracing::error!(
                task_id = %self.task_id,
                error = %e,
                "Failed to append progress line to run record",
            );
        }
    }
}

/// Record sink plus a mirror into the queue job's partial progress, so the
/// substrate's own view of an in-flight job carries the same lines.
pub struct TeeSink {
    record: RecordSink,
    pool: PgPool,
    external_job_id: ExternalJobId,
}

impl TeeSink {
    pub fn new(pool: PgPool, task_id: TaskId, external_job_id: ExternalJobId) -> Self {
        Self {
            record: RecordSink::new(pool.clone(), task_id),
            pool,
            external_job_id,
        }
    }
}

#[async_trait]
impl ProgressSink for TeeSink {
    async fn emit(&self, line: &str) {
        self.record.emit(line).await;
        if let Err(e) = QueueJobRepo::append_progress(&self.pool, self.external_job_id, line).await
        {
            tracing::error!(
                external_job_id = %self.external_job_id,
                error = %e,
                "Failed to mirror progress line into queue job",
            );
        }
    }
}
