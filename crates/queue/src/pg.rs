//! Postgres-backed [`TaskQueue`].

use async_trait::async_trait;
use chrono::Utc;
use sortia_core::types::ExternalJobId;
use sortia_db::models::status::QueueJobState;
use sortia_db::repositories::QueueJobRepo;
use sqlx::PgPool;

use crate::descriptor::JobDescriptor;
use crate::error::QueueError;
use crate::queue::{JobState, TaskQueue};

/// If a worker has not sent a heartbeat within this many seconds, its
/// running claims are treated as gone.
pub const HEARTBEAT_TIMEOUT_SECS: i64 = 120;

/// The production substrate: `queue_jobs` rows claimed by heartbeating
/// workers.
pub struct PgTaskQueue {
    pool: PgPool,
    heartbeat_timeout_secs: i64,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            heartbeat_timeout_secs: HEARTBEAT_TIMEOUT_SECS,
        }
    }

    /// Override the staleness threshold (tests use a short one).
    pub fn with_heartbeat_timeout(pool: PgPool, heartbeat_timeout_secs: i64) -> Self {
        Self {
            pool,
            heartbeat_timeout_secs,
        }
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<ExternalJobId, QueueError> {
        let id = QueueJobRepo::submit(&self.pool, &descriptor.to_value()).await?;
        tracing::debug!(
            external_job_id = %id,
            task_id = %descriptor.task_id,
            task_type = %descriptor.task_type,
            "Job enqueued",
        );
        Ok(id)
    }

    async fn get_state(&self, id: ExternalJobId) -> Result<JobState, QueueError> {
        let Some((state_id, heartbeat)) = QueueJobRepo::live_state(&self.pool, id).await? else {
            return Ok(JobState::Unknown);
        };

        let state = match QueueJobState::from_id(state_id) {
            Some(QueueJobState::Pending) => JobState::Pending,
            Some(QueueJobState::Running) => JobState::Running,
            Some(QueueJobState::Succeeded) => JobState::Succeeded,
            Some(QueueJobState::Failed) => JobState::Failed,
            None => JobState::Unknown,
        };

        // A running claim is only as alive as its worker's heartbeat.
        if state == JobState::Running {
            let stale = match heartbeat {
                Some(last) => {
                    (Utc::now() - last).num_seconds() > self.heartbeat_timeout_secs
                }
                None => true,
            };
            if stale {
                return Ok(JobState::Unknown);
            }
        }

        Ok(state)
    }

    async fn get_result(
        &self,
        id: ExternalJobId,
    ) -> Result<Option<serde_json::Value>, QueueError> {
        let job = QueueJobRepo::find_by_id(&self.pool, id).await?;
        Ok(job.and_then(|j| j.result))
    }

    async fn get_progress(&self, id: ExternalJobId) -> Result<Vec<String>, QueueError> {
        let job = QueueJobRepo::find_by_id(&self.pool, id).await?;
        Ok(job
            .map(|j| {
                j.progress
                    .as_array()
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default())
    }
}
