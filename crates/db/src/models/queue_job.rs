//! Queue-substrate job rows and worker registrations.

use serde::Serialize;
use sortia_core::types::{DbId, ExternalJobId, Timestamp};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `queue_jobs` table.
///
/// `payload` is the self-contained job descriptor serialized at submission;
/// `progress` is a JSONB array of the partial log lines the substrate holds
/// while the job runs; `result` is the terminal payload.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueJob {
    pub id: ExternalJobId,
    pub payload: serde_json::Value,
    pub state_id: StatusId,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub progress: serde_json::Value,
    pub claimed_by: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub submitted_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// A row from the `queue_workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueWorker {
    pub id: DbId,
    pub name: String,
    pub registered_at: Timestamp,
    pub last_heartbeat_at: Timestamp,
}
