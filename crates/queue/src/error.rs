#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
