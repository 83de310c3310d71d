//! Immutable per-run settings snapshot.
//!
//! Taken from the assembly's live source settings at dispatch time and
//! persisted on the record, so later edits to the assembly never
//! retroactively change an in-flight run. The snapshot travels inside the
//! job descriptor: the executor reads configuration from here only.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Everything the executor needs to reach and interpret the source
/// spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// Source spreadsheet identifier.
    pub spreadsheet_id: String,
    /// Tab holding the criteria grid.
    pub criteria_tab: String,
    /// Tab holding the roster of eligible people.
    pub roster_tab: String,
    /// Tab holding already-selected people, for replacement rounds.
    pub already_selected_tab: Option<String>,
    /// Prefix for tabs this system writes (results, and what tab management
    /// enumerates/removes).
    pub output_tab_prefix: String,
    /// Roster column holding the person identifier.
    pub id_column: String,
    /// Roster columns concatenated into the address key.
    pub address_columns: Vec<String>,
    /// Whether same-address duplicates among the selected are flagged.
    pub check_same_address: bool,
    /// Service identity the spreadsheet must be shared with. Used to write
    /// an actionable message when the transport denies access silently.
    pub service_account: String,
}

impl SettingsSnapshot {
    /// Deserialize a snapshot from an assembly's stored source settings.
    ///
    /// A missing or malformed settings document is a dispatch precondition
    /// failure, reported before any record is created.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            CoreError::Validation(format!("Assembly source settings are incomplete: {e}"))
        })
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("snapshot serialization cannot fail")
    }
}
