//! Task-type-tagged run results.
//!
//! The substrate stores one result payload per job; its shape depends on
//! the workflow. Modeling that as a tagged union keeps every decode site
//! exhaustive instead of shape-assumed.

use serde::{Deserialize, Serialize};

use crate::task::RunTaskType;

/// Terminal payload of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Load workflows: what was fetched and what it permits.
    Load {
        people_loaded: usize,
        already_selected_loaded: usize,
        categories: Vec<String>,
        min_selectable: u32,
        max_selectable: u32,
    },
    /// Select workflows: the candidate panels (first one persisted).
    Select {
        panels: Vec<Vec<String>>,
        candidate_count: usize,
        test_mode: bool,
    },
    /// Tab management: the affected tab names.
    Tabs { tab_names: Vec<String>, deleted: bool },
}

impl RunOutcome {
    /// Whether this payload shape belongs to the given workflow. A mismatch
    /// is a programming defect, not user input.
    pub fn matches_task_type(&self, task_type: RunTaskType) -> bool {
        match self {
            RunOutcome::Load { .. } => {
                matches!(task_type, RunTaskType::Load | RunTaskType::LoadReplacement)
            }
            RunOutcome::Select { .. } => task_type.runs_selection(),
            RunOutcome::Tabs { .. } => task_type.is_tab_management(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let outcome = RunOutcome::Tabs {
            tab_names: vec!["Selected ab12".into()],
            deleted: false,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "tabs");
        assert_eq!(serde_json::from_value::<RunOutcome>(json).unwrap(), outcome);
    }

    #[test]
    fn shape_matches_workflows() {
        let load = RunOutcome::Load {
            people_loaded: 1,
            already_selected_loaded: 0,
            categories: vec![],
            min_selectable: 0,
            max_selectable: 1,
        };
        assert!(load.matches_task_type(RunTaskType::Load));
        assert!(load.matches_task_type(RunTaskType::LoadReplacement));
        assert!(!load.matches_task_type(RunTaskType::Select));

        let select = RunOutcome::Select {
            panels: vec![],
            candidate_count: 0,
            test_mode: true,
        };
        assert!(select.matches_task_type(RunTaskType::TestSelect));
        assert!(!select.matches_task_type(RunTaskType::DeleteOldTabs));
    }
}
