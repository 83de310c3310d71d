//! Assembly entity, the host of every selection run.
//!
//! Only the slice this subsystem needs: existence, the manage capability
//! join table, and the source settings that get snapshotted at dispatch.

use serde::Serialize;
use sortia_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `assemblies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assembly {
    pub id: DbId,
    pub title: String,
    /// Live source settings; `None` until an organizer configures the
    /// spreadsheet. Snapshotted into each run's `settings_used`.
    pub source_settings: Option<serde_json::Value>,
    pub created_at: Timestamp,
}
