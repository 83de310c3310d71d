//! Repository for the queue substrate: `queue_jobs` and `queue_workers`.
//!
//! Claiming uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers
//! never double-claim a job.

use sortia_core::types::{DbId, ExternalJobId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::queue_job::{QueueJob, QueueWorker};
use crate::models::status::{QueueJobState, StatusId};

const COLUMNS: &str = "\
    id, payload, state_id, result, error_message, progress, \
    claimed_by, claimed_at, submitted_at, finished_at";

pub struct QueueJobRepo;

impl QueueJobRepo {
    /// Enqueue a job payload. Returns the substrate-assigned job id.
    pub async fn submit(
        pool: &PgPool,
        payload: &serde_json::Value,
    ) -> Result<ExternalJobId, sqlx::Error> {
        let id: ExternalJobId = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO queue_jobs (id, payload, state_id, progress) \
             VALUES ($1, $2, $3, '[]'::jsonb)",
        )
        .bind(id)
        .bind(payload)
        .bind(QueueJobState::Pending.id())
        .execute(pool)
        .await?;
        Ok(id)
    }

    /// Atomically claim the oldest pending job for a worker.
    pub async fn claim_next(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_jobs \
             SET claimed_by = $1, claimed_at = NOW(), state_id = $2 \
             WHERE id = ( \
                 SELECT id FROM queue_jobs \
                 WHERE state_id = $3 \
                 ORDER BY submitted_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(worker_id)
            .bind(QueueJobState::Running.id())
            .bind(QueueJobState::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Append one partial progress line to a running job.
    pub async fn append_progress(
        pool: &PgPool,
        job_id: ExternalJobId,
        line: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs SET progress = progress || $2::jsonb \
             WHERE id = $1 AND state_id = $3",
        )
        .bind(job_id)
        .bind(serde_json::json!([line]))
        .bind(QueueJobState::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job succeeded with its result payload.
    pub async fn succeed(
        pool: &PgPool,
        job_id: ExternalJobId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET state_id = $2, result = $3, finished_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(QueueJobState::Succeeded.id())
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed with an error message.
    pub async fn fail(
        pool: &PgPool,
        job_id: ExternalJobId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET state_id = $2, error_message = $3, finished_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(QueueJobState::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &PgPool,
        job_id: ExternalJobId,
    ) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM queue_jobs WHERE id = $1");
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// A job's state plus its claiming worker's last heartbeat, in one
    /// round trip. The heartbeat is what turns a dead worker's RUNNING
    /// claim into an UNKNOWN state upstream.
    pub async fn live_state(
        pool: &PgPool,
        job_id: ExternalJobId,
    ) -> Result<Option<(StatusId, Option<Timestamp>)>, sqlx::Error> {
        sqlx::query_as::<_, (StatusId, Option<Timestamp>)>(
            "SELECT qj.state_id, qw.last_heartbeat_at \
             FROM queue_jobs qj \
             LEFT JOIN queue_workers qw ON qw.id = qj.claimed_by \
             WHERE qj.id = $1",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await
    }

    // -- Worker registry -----------------------------------------------------

    /// Register a worker process, returning its id.
    pub async fn register_worker(pool: &PgPool, name: &str) -> Result<QueueWorker, sqlx::Error> {
        sqlx::query_as::<_, QueueWorker>(
            "INSERT INTO queue_workers (name) VALUES ($1) \
             RETURNING id, name, registered_at, last_heartbeat_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Refresh a worker's heartbeat.
    pub async fn heartbeat(pool: &PgPool, worker_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE queue_workers SET last_heartbeat_at = NOW() WHERE id = $1")
            .bind(worker_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
