//! The claim/execute loop and the heartbeat task.
//!
//! One runtime per worker process. Jobs are claimed one at a time with
//! `FOR UPDATE SKIP LOCKED`, executed to a terminal state (external calls
//! are not cancellable mid-flight), and their queue-side result written
//! back. The heartbeat task is what keeps this worker's claims from
//! reading as gone.

use std::sync::Arc;
use std::time::Duration;

use sortia_db::models::queue_job::QueueJob;
use sortia_db::repositories::QueueJobRepo;
use sortia_pipeline::{execute_job, ExecutionResult, JobContext, TeeSink};
use sortia_queue::JobDescriptor;
use sortia_sheets::client::SheetsClient;
use sortia_sheets::spreadsheet::SpreadsheetSource;
use sortia_stratify::Stratifier;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the claim loop polls for pending jobs.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often the heartbeat task refreshes this worker's liveness.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One worker process's runtime.
pub struct WorkerRuntime {
    pool: PgPool,
    worker_id: i64,
    sheets: SheetsClient,
    stratifier: Arc<dyn Stratifier>,
}

impl WorkerRuntime {
    /// Register this process in the worker registry.
    pub async fn register(
        pool: PgPool,
        name: &str,
        sheets: SheetsClient,
        stratifier: Arc<dyn Stratifier>,
    ) -> Result<Self, sqlx::Error> {
        let worker = QueueJobRepo::register_worker(&pool, name).await?;
        tracing::info!(worker_id = worker.id, name, "Worker registered");
        Ok(Self {
            pool,
            worker_id: worker.id,
            sheets,
            stratifier,
        })
    }

    /// Spawn the heartbeat task. Runs until the token is cancelled.
    pub fn spawn_heartbeat(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        let worker_id = self.worker_id;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = QueueJobRepo::heartbeat(&pool, worker_id).await {
                            tracing::error!(worker_id, error = %e, "Heartbeat write failed");
                        }
                    }
                }
            }
        })
    }

    /// Run the claim loop until the cancellation token is triggered.
    ///
    /// A job in flight when shutdown is requested runs to its terminal
    /// state first; cancellation only stops new claims.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            worker_id = self.worker_id,
            poll_interval_ms = POLL_INTERVAL.as_millis() as u64,
            "Worker claim loop started",
        );
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker_id = self.worker_id, "Worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match QueueJobRepo::claim_next(&self.pool, self.worker_id).await {
                        Ok(Some(job)) => self.execute_claimed(job).await,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(
                                worker_id = self.worker_id,
                                error = %e,
                                "Claim query failed",
                            );
                        }
                    }
                }
            }
        }
    }

    /// Execute one claimed job and write its queue-side terminal state.
    async fn execute_claimed(&self, job: QueueJob) {
        let descriptor = match JobDescriptor::from_value(&job.payload) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::error!(
                    external_job_id = %job.id,
                    error = %e,
                    "Claimed job has a malformed payload",
                );
                if let Err(e) =
                    QueueJobRepo::fail(&self.pool, job.id, "Malformed job payload").await
                {
                    tracing::error!(external_job_id = %job.id, error = %e, "Failed to fail job");
                }
                return;
            }
        };

        tracing::info!(
            external_job_id = %job.id,
            task_id = %descriptor.task_id,
            task_type = %descriptor.task_type,
            "Job claimed",
        );

        // All collaborators come from the descriptor's snapshot; the live
        // assembly configuration is never consulted from here on.
        let run_label = short_label(descriptor.task_id);
        let source = SpreadsheetSource::new(
            self.sheets.clone(),
            descriptor.settings.clone(),
            run_label,
        );
        let sink = TeeSink::new(self.pool.clone(), descriptor.task_id, job.id);

        let result = execute_job(JobContext {
            pool: &self.pool,
            descriptor: &descriptor,
            source: &source,
            stratifier: self.stratifier.as_ref(),
            sink: &sink,
        })
        .await;

        let write = match result {
            ExecutionResult::Succeeded(payload) => {
                QueueJobRepo::succeed(&self.pool, job.id, &payload).await
            }
            ExecutionResult::Failed(message) => {
                QueueJobRepo::fail(&self.pool, job.id, &message).await
            }
        };
        if let Err(e) = write {
            tracing::error!(
                external_job_id = %job.id,
                error = %e,
                "Failed to write terminal queue state",
            );
        }
    }
}

/// Short, tab-name-friendly form of a task id.
fn short_label(task_id: sortia_core::types::TaskId) -> String {
    task_id.simple().to_string()[..8].to_string()
}
