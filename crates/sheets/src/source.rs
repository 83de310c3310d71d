//! The data-source seam the pipeline executes against.

use async_trait::async_trait;
use sortia_core::criteria::Criteria;
use sortia_core::roster::Person;

use crate::error::SheetsError;

/// Everything the WRITE stage hands back to the source in one call.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Selected people, in panel order.
    pub selected: Vec<Person>,
    /// Everyone else, in roster order.
    pub remaining: Vec<Person>,
    /// Already-selected people carried over from earlier rounds.
    pub already_selected: Vec<Person>,
    /// Ids among `selected` flagged as sharing an address.
    pub same_address_flagged: Vec<String>,
}

/// Read/write access to one assembly's source spreadsheet.
///
/// Implementations may fail with connectivity, permission, or
/// domain-validation errors; the pipeline maps each class onto the run
/// record (§ error taxonomy in the crate docs).
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load_criteria(&self) -> Result<Criteria, SheetsError>;

    async fn load_roster(&self, criteria: &Criteria) -> Result<Vec<Person>, SheetsError>;

    async fn load_already_selected(
        &self,
        criteria: &Criteria,
    ) -> Result<Vec<Person>, SheetsError>;

    async fn write_results(&self, request: &WriteRequest) -> Result<(), SheetsError>;

    /// Enumerate prior output tabs; remove them when `dry_run` is false.
    /// Returns the affected tab names either way.
    async fn list_old_output_tabs(&self, dry_run: bool) -> Result<Vec<String>, SheetsError>;
}
