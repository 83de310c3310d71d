//! Failure taxonomy for the data source.

/// Errors raised by the spreadsheet adapter.
///
/// `PermissionDenied` carries the transport's own explanation when one
/// exists; some transports deny access with an empty body, in which case
/// `detail` is `None` and the executor substitutes an actionable message
/// naming the service identity that needs access.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("Could not reach the spreadsheet service: {0}")]
    Connectivity(String),

    #[error("Access to the spreadsheet was denied")]
    PermissionDenied { detail: Option<String> },

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Malformed source data: {0}")]
    Validation(String),
}
