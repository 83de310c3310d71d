//! Pure domain types and logic for selection runs.
//!
//! This crate has no internal dependencies and no I/O. Everything here is
//! either a data type shared across the workspace or a pure function with
//! unit tests at the bottom of its module.

pub mod criteria;
pub mod error;
pub mod outcome;
pub mod report;
pub mod roster;
pub mod settings;
pub mod task;
pub mod types;
