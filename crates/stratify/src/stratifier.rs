use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sortia_core::criteria::Criteria;
use sortia_core::report::RunReport;
use sortia_core::roster::{Panel, Person};

/// One stratification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifyRequest {
    pub criteria: Criteria,
    pub roster: Vec<Person>,
    /// People from earlier rounds the algorithm must not select again.
    pub already_selected: Vec<Person>,
    pub target_count: u32,
    /// Test mode asks the algorithm to validate feasibility and report
    /// without committing to reproducible output.
    pub test_mode: bool,
}

/// What the algorithm returned.
///
/// `feasible == false` means no panel satisfies the quotas; `report` then
/// carries the explanation. The contract allows multiple candidate panels;
/// callers persist only the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifyOutcome {
    pub feasible: bool,
    pub panels: Vec<Panel>,
    pub report: RunReport,
}

#[derive(Debug, thiserror::Error)]
pub enum StratifyError {
    #[error("Could not reach the selection algorithm: {0}")]
    Connectivity(String),

    #[error("Selection algorithm rejected the request: {0}")]
    BadRequest(String),
}

/// The selection-algorithm seam.
#[async_trait]
pub trait Stratifier: Send + Sync {
    async fn stratify(&self, request: &StratifyRequest) -> Result<StratifyOutcome, StratifyError>;
}
