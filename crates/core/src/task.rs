//! Selection-run task types.
//!
//! A task type names one workflow a run can execute. Stored as TEXT in the
//! `selection_runs` table and round-tripped through [`RunTaskType::as_str`] /
//! [`RunTaskType::parse`], so the API and the worker agree on the names.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The seven run workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunTaskType {
    /// Fetch and validate criteria + roster, nothing else.
    Load,
    /// Full selection: load, stratify, write results back.
    Select,
    /// Selection without the write-back stage (dry run of the algorithm).
    TestSelect,
    /// Load variant that also fetches the already-selected tab, for
    /// replacement rounds.
    LoadReplacement,
    /// Selection excluding already-selected people, for replacement rounds.
    SelectReplacement,
    /// Enumerate prior output tabs without touching them.
    ListOldTabs,
    /// Destructively remove prior output tabs.
    DeleteOldTabs,
}

impl RunTaskType {
    /// Canonical wire/storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            RunTaskType::Load => "LOAD",
            RunTaskType::Select => "SELECT",
            RunTaskType::TestSelect => "TEST_SELECT",
            RunTaskType::LoadReplacement => "LOAD_REPLACEMENT",
            RunTaskType::SelectReplacement => "SELECT_REPLACEMENT",
            RunTaskType::ListOldTabs => "LIST_OLD_TABS",
            RunTaskType::DeleteOldTabs => "DELETE_OLD_TABS",
        }
    }

    /// Parse a stored task-type name back into the enum.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "LOAD" => Ok(RunTaskType::Load),
            "SELECT" => Ok(RunTaskType::Select),
            "TEST_SELECT" => Ok(RunTaskType::TestSelect),
            "LOAD_REPLACEMENT" => Ok(RunTaskType::LoadReplacement),
            "SELECT_REPLACEMENT" => Ok(RunTaskType::SelectReplacement),
            "LIST_OLD_TABS" => Ok(RunTaskType::ListOldTabs),
            "DELETE_OLD_TABS" => Ok(RunTaskType::DeleteOldTabs),
            other => Err(CoreError::Internal(format!(
                "Unknown task type '{other}' in stored record"
            ))),
        }
    }

    /// True for workflows that run the stratification stage.
    pub fn runs_selection(self) -> bool {
        matches!(
            self,
            RunTaskType::Select | RunTaskType::TestSelect | RunTaskType::SelectReplacement
        )
    }

    /// True for workflows that write result tables back to the source.
    ///
    /// Test selection deliberately stops after the algorithm.
    pub fn writes_results(self) -> bool {
        matches!(self, RunTaskType::Select | RunTaskType::SelectReplacement)
    }

    /// True for replacement-round workflows, which fetch the
    /// already-selected tab and exclude those people.
    pub fn uses_already_selected(self) -> bool {
        matches!(
            self,
            RunTaskType::LoadReplacement | RunTaskType::SelectReplacement
        )
    }

    /// True for the single-stage tab-management workflows.
    pub fn is_tab_management(self) -> bool {
        matches!(self, RunTaskType::ListOldTabs | RunTaskType::DeleteOldTabs)
    }

    /// True when the workflow requires a positive target count at dispatch.
    pub fn requires_target_count(self) -> bool {
        self.runs_selection()
    }
}

impl std::fmt::Display for RunTaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
