//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for inserts where a handler accepts a body

pub mod assembly;
pub mod queue_job;
pub mod selection_run;
pub mod status;
