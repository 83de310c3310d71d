use async_trait::async_trait;
use sortia_core::types::ExternalJobId;

use crate::descriptor::JobDescriptor;
use crate::error::QueueError;

/// The substrate's live view of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// The substrate has no (trustworthy) record of the job: the id was
    /// never seen, or its claiming worker stopped heartbeating.
    Unknown,
}

impl JobState {
    /// States in which the substrate is still actively responsible for the
    /// job. The health monitor never force-fails a record in these states.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Running | JobState::Succeeded)
    }
}

/// Submission and lookup against the async substrate.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a job; returns the substrate-assigned external id.
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<ExternalJobId, QueueError>;

    /// The substrate's current view of the job.
    async fn get_state(&self, id: ExternalJobId) -> Result<JobState, QueueError>;

    /// Terminal result payload, if the job has one.
    async fn get_result(&self, id: ExternalJobId) -> Result<Option<serde_json::Value>, QueueError>;

    /// Partial progress lines the substrate holds for an in-flight job.
    async fn get_progress(&self, id: ExternalJobId) -> Result<Vec<String>, QueueError>;
}
