//! The job executor: drives a claimed run through its stages and owns
//! every write to the run record while doing so.
//!
//! Stages compose per task type (load-only, full select, test select, tab
//! management); intermediate stages leave the record RUNNING and only the
//! final stage writes the terminal state, so a mid-pipeline crash shows up
//! as stuck-RUNNING for the health monitor instead of a false COMPLETED.

pub mod error;
pub mod executor;
pub mod progress;
pub mod stages;

pub use executor::{execute_job, ExecutionResult, JobContext};
pub use progress::{ProgressSink, RecordSink, TeeSink};
