//! Production [`DataSource`] over the spreadsheet gateway.

use async_trait::async_trait;
use sortia_core::criteria::Criteria;
use sortia_core::roster::Person;
use sortia_core::settings::SettingsSnapshot;

use crate::client::SheetsClient;
use crate::error::SheetsError;
use crate::parse;
use crate::source::{DataSource, WriteRequest};

/// One assembly's spreadsheet, configured by the run's settings snapshot.
///
/// `run_label` distinguishes this run's output tabs from earlier ones
/// (callers pass a short task-id form), so repeated runs accumulate tabs
/// that tab management can later enumerate or remove.
pub struct SpreadsheetSource {
    client: SheetsClient,
    snapshot: SettingsSnapshot,
    run_label: String,
}

impl SpreadsheetSource {
    pub fn new(client: SheetsClient, snapshot: SettingsSnapshot, run_label: String) -> Self {
        Self {
            client,
            snapshot,
            run_label,
        }
    }

    fn output_tab(&self, kind: &str) -> String {
        format!("{} {kind} {}", self.snapshot.output_tab_prefix, self.run_label)
    }

    /// Render people as a grid: id column plus one column per attribute the
    /// roster carried, with a flag column when address checking is on.
    fn people_grid(&self, people: &[Person], flagged: &[String]) -> Vec<Vec<String>> {
        let mut columns: Vec<String> = vec![self.snapshot.id_column.clone()];
        let mut attribute_names: Vec<String> = people
            .first()
            .map(|p| p.attributes.keys().cloned().collect())
            .unwrap_or_default();
        attribute_names.sort();
        columns.extend(attribute_names.iter().cloned());
        if self.snapshot.check_same_address {
            columns.push("shares_address".to_string());
        }

        let mut rows = vec![columns];
        for person in people {
            let mut row = vec![person.id.clone()];
            for name in &attribute_names {
                row.push(person.attributes.get(name).cloned().unwrap_or_default());
            }
            if self.snapshot.check_same_address {
                row.push(if flagged.contains(&person.id) { "yes" } else { "" }.to_string());
            }
            rows.push(row);
        }
        rows
    }
}

#[async_trait]
impl DataSource for SpreadsheetSource {
    async fn load_criteria(&self) -> Result<Criteria, SheetsError> {
        let grid = self
            .client
            .read_grid(&self.snapshot.spreadsheet_id, &self.snapshot.criteria_tab)
            .await?;
        parse::parse_criteria(&grid)
    }

    async fn load_roster(&self, criteria: &Criteria) -> Result<Vec<Person>, SheetsError> {
        let grid = self
            .client
            .read_grid(&self.snapshot.spreadsheet_id, &self.snapshot.roster_tab)
            .await?;
        parse::parse_people(&grid, criteria, &self.snapshot)
    }

    async fn load_already_selected(
        &self,
        criteria: &Criteria,
    ) -> Result<Vec<Person>, SheetsError> {
        let tab = self.snapshot.already_selected_tab.as_deref().ok_or_else(|| {
            SheetsError::Validation(
                "No already-selected tab is configured for this assembly".to_string(),
            )
        })?;
        let grid = self
            .client
            .read_grid(&self.snapshot.spreadsheet_id, tab)
            .await?;
        parse::parse_people(&grid, criteria, &self.snapshot)
    }

    async fn write_results(&self, request: &WriteRequest) -> Result<(), SheetsError> {
        let spreadsheet = &self.snapshot.spreadsheet_id;

        let selected_grid = self.people_grid(&request.selected, &request.same_address_flagged);
        self.client
            .write_grid(spreadsheet, &self.output_tab("Selected"), &selected_grid)
            .await?;

        let remaining_grid = self.people_grid(&request.remaining, &[]);
        self.client
            .write_grid(spreadsheet, &self.output_tab("Remaining"), &remaining_grid)
            .await?;

        if !request.already_selected.is_empty() {
            let carried_grid = self.people_grid(&request.already_selected, &[]);
            self.client
                .write_grid(spreadsheet, &self.output_tab("Carried Over"), &carried_grid)
                .await?;
        }

        tracing::info!(
            spreadsheet_id = %spreadsheet,
            selected = request.selected.len(),
            remaining = request.remaining.len(),
            "Wrote selection results back to the source",
        );
        Ok(())
    }

    async fn list_old_output_tabs(&self, dry_run: bool) -> Result<Vec<String>, SheetsError> {
        let tabs = self.client.list_tabs(&self.snapshot.spreadsheet_id).await?;
        let matching: Vec<String> = tabs
            .into_iter()
            .filter(|t| t.starts_with(&self.snapshot.output_tab_prefix))
            .collect();

        if !dry_run {
            for tab in &matching {
                self.client
                    .delete_tab(&self.snapshot.spreadsheet_id, tab)
                    .await?;
            }
            tracing::info!(
                spreadsheet_id = %self.snapshot.spreadsheet_id,
                removed = matching.len(),
                "Removed old output tabs",
            );
        }

        Ok(matching)
    }
}
