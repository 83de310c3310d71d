//! The async substrate: job submission, live state lookup, and results.
//!
//! [`TaskQueue`] is the seam the dispatcher, status aggregator, and health
//! monitor consume. The production implementation is Postgres-backed:
//! workers claim rows with `FOR UPDATE SKIP LOCKED` and prove liveness via
//! heartbeats, so a hard-killed worker's claim eventually reads as
//! [`JobState::Unknown`].

pub mod descriptor;
pub mod error;
pub mod pg;
mod queue;

pub use descriptor::{JobDescriptor, RunParams};
pub use error::QueueError;
pub use queue::{JobState, TaskQueue};
