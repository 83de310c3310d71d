/// All database primary keys for host entities (assemblies, users, workers)
/// are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Internal correlation id for a selection run, minted by the dispatcher.
/// Distinct from the queue substrate's own job id.
pub type TaskId = uuid::Uuid;

/// Job id assigned by the queue substrate at submission time.
pub type ExternalJobId = uuid::Uuid;
