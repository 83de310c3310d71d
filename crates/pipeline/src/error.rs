//! Stage failure classification and user-facing messages.

use sortia_core::error::CoreError;
use sortia_sheets::error::SheetsError;
use sortia_stratify::StratifyError;

/// Why a stage stopped the run.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The data source failed (connectivity, permission, missing tab).
    #[error("{0}")]
    Source(#[from] SheetsError),

    /// Loaded data failed structural validation.
    #[error("{0}")]
    Validation(#[from] CoreError),

    /// The algorithm service could not be used.
    #[error("{0}")]
    Algorithm(#[from] StratifyError),

    /// The algorithm ran but found no panel satisfying the quotas.
    #[error("Selection infeasible: {0}")]
    Infeasible(String),
}

impl StageError {
    /// Short message stored on the failed record.
    ///
    /// A permission denial that arrived without any transport detail is
    /// rewritten into an instruction naming the service identity that needs
    /// access to the spreadsheet.
    pub fn user_message(&self, service_account: &str) -> String {
        match self {
            StageError::Source(SheetsError::PermissionDenied { detail: None }) => format!(
                "The spreadsheet is not shared with {service_account}. \
                 Grant that account access and dispatch a new run."
            ),
            StageError::Source(SheetsError::PermissionDenied { detail: Some(detail) }) => {
                format!("Access to the spreadsheet was denied: {detail}")
            }
            other => other.to_string(),
        }
    }
}
