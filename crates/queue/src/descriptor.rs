//! Self-contained job descriptors.
//!
//! The descriptor carries everything the executor needs (identity,
//! workflow, settings snapshot, parameters), so a worker never re-reads
//! mutable assembly configuration mid-run.

use serde::{Deserialize, Serialize};
use sortia_core::settings::SettingsSnapshot;
use sortia_core::task::RunTaskType;
use sortia_core::types::{DbId, TaskId};

/// Workflow-specific parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    /// Requested panel size. Present exactly for the select workflows.
    pub target_count: Option<u32>,
}

/// The payload submitted to the queue substrate, one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub task_id: TaskId,
    pub task_type: RunTaskType,
    pub assembly_id: DbId,
    pub user_id: DbId,
    pub settings: SettingsSnapshot,
    pub params: RunParams,
}

impl JobDescriptor {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("descriptor serialization cannot fail")
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn descriptor_round_trips_through_json() {
        let descriptor = JobDescriptor {
            task_id: Uuid::now_v7(),
            task_type: RunTaskType::Select,
            assembly_id: 12,
            user_id: 7,
            settings: SettingsSnapshot {
                spreadsheet_id: "sheet-1".into(),
                criteria_tab: "Categories".into(),
                roster_tab: "Respondents".into(),
                already_selected_tab: None,
                output_tab_prefix: "Selected".into(),
                id_column: "id".into(),
                address_columns: vec![],
                check_same_address: false,
                service_account: "runs@example.test".into(),
            },
            params: RunParams {
                target_count: Some(10),
            },
        };

        let value = descriptor.to_value();
        assert_eq!(value["task_type"], "SELECT");
        assert_eq!(JobDescriptor::from_value(&value).unwrap(), descriptor);
    }
}
