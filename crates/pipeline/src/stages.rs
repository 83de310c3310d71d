//! The composable pipeline stages.
//!
//! Each stage receives the progress sink explicitly, appends its report
//! entries to the record before returning, and leaves terminal-state
//! writes to the executor. The algorithm's own report is appended even
//! when the selection is infeasible, so a failed run keeps the full
//! explanation.

use sortia_core::criteria::{self, Criteria};
use sortia_core::report::RunReport;
use sortia_core::roster::{self, Panel, Person};
use sortia_db::repositories::SelectionRunRepo;
use sortia_queue::JobDescriptor;
use sortia_sheets::source::{DataSource, WriteRequest};
use sortia_stratify::{Stratifier, StratifyRequest};
use sqlx::PgPool;

use crate::error::StageError;
use crate::progress::ProgressSink;

/// Everything LOAD produced, handed to SELECT and WRITE.
pub struct LoadOutput {
    pub criteria: Criteria,
    pub roster: Vec<Person>,
    pub already_selected: Vec<Person>,
    pub min_selectable: u32,
    pub max_selectable: u32,
}

/// Append a stage's report entries to the record, preserving order.
async fn flush_report(pool: &PgPool, descriptor: &JobDescriptor, report: &RunReport) {
    if report.is_empty() {
        return;
    }
    let entries = serde_json::to_value(&report.entries).expect("report serialization cannot fail");
    if let Err(e) =
        SelectionRunRepo::append_report_entries(pool, descriptor.task_id, &entries).await
    {
        tracing::error!(
            task_id = %descriptor.task_id,
            error = %e,
            "Failed to append stage report to run record",
        );
    }
}

// ---------------------------------------------------------------------------
// LOAD
// ---------------------------------------------------------------------------

/// Fetch criteria and roster (plus already-selected for replacement
/// workflows) and validate structural correctness. Any failure here stops
/// the run before later stages see it.
pub async fn load(
    pool: &PgPool,
    descriptor: &JobDescriptor,
    source: &dyn DataSource,
    sink: &dyn ProgressSink,
) -> Result<LoadOutput, StageError> {
    let settings = &descriptor.settings;
    let mut report = RunReport::new();

    sink.emit(&format!("Loading criteria from tab \"{}\"", settings.criteria_tab))
        .await;
    let criteria = source.load_criteria().await?;
    criteria::validate_structure(&criteria)?;
    sink.emit(&format!("Loaded {} categories", criteria.categories.len()))
        .await;
    report.info(format!(
        "Criteria loaded: {} categories",
        criteria.categories.len()
    ));

    let roster = source.load_roster(&criteria).await?;
    sink.emit(&format!(
        "Loaded {} people from tab \"{}\"",
        roster.len(),
        settings.roster_tab
    ))
    .await;
    criteria::validate_coverage(&criteria, &roster)?;
    report.info(format!("Roster loaded: {} people", roster.len()));

    let already_selected = if descriptor.task_type.uses_already_selected() {
        let already = source.load_already_selected(&criteria).await?;
        sink.emit(&format!("Loaded {} already-selected people", already.len()))
            .await;
        report.info(format!("Already selected: {} people", already.len()));
        already
    } else {
        Vec::new()
    };

    let min_selectable = criteria.min_selectable();
    let max_selectable = criteria.max_selectable();
    sink.emit(&format!(
        "Between {min_selectable} and {max_selectable} people can be selected"
    ))
    .await;

    // The dispatcher checked positivity; only now, with criteria in hand,
    // can the range itself be checked.
    if let Some(target) = descriptor.params.target_count {
        criteria::validate_target_count(&criteria, target)?;
    }

    flush_report(pool, descriptor, &report).await;
    Ok(LoadOutput {
        criteria,
        roster,
        already_selected,
        min_selectable,
        max_selectable,
    })
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

/// Invoke the external algorithm. Returns the first candidate panel and
/// the total candidate count; an infeasible selection fails the run with
/// the algorithm's explanation.
pub async fn select(
    pool: &PgPool,
    descriptor: &JobDescriptor,
    loaded: &LoadOutput,
    stratifier: &dyn Stratifier,
    sink: &dyn ProgressSink,
) -> Result<(Panel, usize), StageError> {
    let target_count = descriptor.params.target_count.ok_or_else(|| {
        StageError::Validation(sortia_core::error::CoreError::Internal(
            "Select workflow dispatched without a target count".to_string(),
        ))
    })?;

    sink.emit(&format!(
        "Running stratified selection for a panel of {target_count}"
    ))
    .await;

    let request = StratifyRequest {
        criteria: loaded.criteria.clone(),
        roster: loaded.roster.clone(),
        already_selected: loaded.already_selected.clone(),
        target_count,
        test_mode: descriptor.task_type == sortia_core::task::RunTaskType::TestSelect,
    };
    let outcome = stratifier.stratify(&request).await?;

    // The algorithm's report belongs on the record whether or not a panel
    // was found.
    flush_report(pool, descriptor, &outcome.report).await;

    if !outcome.feasible {
        let explanation = outcome
            .report
            .entries
            .iter()
            .rev()
            .find(|e| e.severity == sortia_core::report::Severity::Error)
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "no panel satisfies the quotas".to_string());
        return Err(StageError::Infeasible(explanation));
    }

    let candidate_count = outcome.panels.len();
    let first = outcome.panels.into_iter().next().ok_or_else(|| {
        StageError::Validation(sortia_core::error::CoreError::Internal(
            "Algorithm reported success but returned no panels".to_string(),
        ))
    })?;
    first.validate_against(&loaded.roster)?;

    sink.emit(&format!(
        "Algorithm returned {candidate_count} candidate panel(s); keeping the first ({} people)",
        first.members.len()
    ))
    .await;

    Ok((first, candidate_count))
}

// ---------------------------------------------------------------------------
// WRITE
// ---------------------------------------------------------------------------

/// Partition the roster by the winning panel, flag same-address
/// duplicates, and write result tables back to the source.
pub async fn write(
    pool: &PgPool,
    descriptor: &JobDescriptor,
    loaded: &LoadOutput,
    panel: &Panel,
    source: &dyn DataSource,
    sink: &dyn ProgressSink,
) -> Result<(), StageError> {
    let mut report = RunReport::new();
    let (selected, remaining) = roster::partition(&loaded.roster, panel);

    let same_address_flagged = if descriptor.settings.check_same_address {
        let flagged = roster::flag_same_address(&selected);
        if !flagged.is_empty() {
            sink.emit(&format!(
                "Flagged {} selected people sharing an address",
                flagged.len()
            ))
            .await;
            report.warning(format!(
                "{} selected people share an address: {}",
                flagged.len(),
                flagged.join(", ")
            ));
        }
        flagged
    } else {
        Vec::new()
    };

    let request = WriteRequest {
        selected: selected.into_iter().cloned().collect(),
        remaining: remaining.into_iter().cloned().collect(),
        already_selected: loaded.already_selected.clone(),
        same_address_flagged,
    };
    source.write_results(&request).await?;

    sink.emit("Wrote selected and remaining tables back to the spreadsheet")
        .await;
    report.info(format!(
        "Results written: {} selected, {} remaining",
        request.selected.len(),
        request.remaining.len()
    ));
    flush_report(pool, descriptor, &report).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// TABS
// ---------------------------------------------------------------------------

/// Single-stage tab management: enumerate prior output tabs, and remove
/// them for the destructive workflow.
pub async fn manage_tabs(
    pool: &PgPool,
    descriptor: &JobDescriptor,
    dry_run: bool,
    source: &dyn DataSource,
    sink: &dyn ProgressSink,
) -> Result<Vec<String>, StageError> {
    let mut report = RunReport::new();
    let tabs = source.list_old_output_tabs(dry_run).await?;

    if tabs.is_empty() {
        sink.emit("No old output tabs were found").await;
        report.info("No old output tabs were found");
    } else if dry_run {
        sink.emit(&format!("Found {} old output tab(s)", tabs.len())).await;
        report.info(format!("Old output tabs: {}", tabs.join(", ")));
    } else {
        sink.emit(&format!("Deleted {} old output tab(s)", tabs.len())).await;
        report.info(format!("Deleted output tabs: {}", tabs.join(", ")));
    }

    flush_report(pool, descriptor, &report).await;
    Ok(tabs)
}
