//! State-machine tests for the `selection_runs` repository.

use sortia_core::task::RunTaskType;
use sortia_db::models::selection_run::NewSelectionRun;
use sortia_db::models::status::{RunStatus, SubmissionPhase};
use sortia_db::repositories::SelectionRunRepo;
use sqlx::PgPool;
use uuid::Uuid;

async fn create_assembly(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO assemblies (title, source_settings) VALUES ($1, $2) RETURNING id",
    )
    .bind("Test assembly")
    .bind(serde_json::json!({ "spreadsheet_id": "sheet-1" }))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn create_run(pool: &PgPool, task_type: RunTaskType) -> sortia_core::types::TaskId {
    let assembly_id = create_assembly(pool).await;
    let record = SelectionRunRepo::create(
        pool,
        &NewSelectionRun {
            assembly_id,
            user_id: 7,
            task_type,
            settings_used: serde_json::json!({ "spreadsheet_id": "sheet-1" }),
        },
    )
    .await
    .unwrap();
    record.task_id
}

#[sqlx::test(migrations = "./migrations")]
async fn create_starts_pending_in_created_phase(pool: PgPool) {
    let assembly_id = create_assembly(&pool).await;
    let record = SelectionRunRepo::create(
        &pool,
        &NewSelectionRun {
            assembly_id,
            user_id: 7,
            task_type: RunTaskType::Select,
            settings_used: serde_json::json!({ "spreadsheet_id": "sheet-1" }),
        },
    )
    .await
    .unwrap();

    assert_eq!(record.status_id, RunStatus::Pending.id());
    assert_eq!(record.submission_phase, SubmissionPhase::Created.id());
    assert_eq!(record.task_type, "SELECT");
    assert!(record.external_job_id.is_none());
    assert!(record.completed_at.is_none());
    assert!(record.log_lines().is_empty());
    assert_eq!(record.run_report["entries"], serde_json::json!([]));
}

#[sqlx::test(migrations = "./migrations")]
async fn acknowledge_sets_external_id_exactly_once(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Load).await;
    let first = Uuid::now_v7();
    let second = Uuid::now_v7();

    assert!(SelectionRunRepo::acknowledge(&pool, task_id, first).await.unwrap());
    assert!(!SelectionRunRepo::acknowledge(&pool, task_id, second).await.unwrap());

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.external_job_id, Some(first));
    assert_eq!(record.submission_phase, SubmissionPhase::Acknowledged.id());
}

#[sqlx::test(migrations = "./migrations")]
async fn mark_submitted_advances_phase(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Load).await;
    SelectionRunRepo::mark_submitted(&pool, task_id).await.unwrap();

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.submission_phase, SubmissionPhase::Submitted.id());
}

#[sqlx::test(migrations = "./migrations")]
async fn log_appends_preserve_emission_order_and_force_running(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Select).await;

    for line in ["Loading criteria", "Loaded 50 people", "Running selection"] {
        SelectionRunRepo::append_log_line(&pool, task_id, line).await.unwrap();
    }

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Running.id());
    assert_eq!(
        record.log_lines(),
        vec!["Loading criteria", "Loaded 50 people", "Running selection"]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn complete_is_terminal(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Select).await;
    let panels = serde_json::json!([["p1", "p2"]]);

    assert!(SelectionRunRepo::complete(&pool, task_id, Some(&panels)).await.unwrap());

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Completed.id());
    assert!(record.completed_at.is_some());
    assert_eq!(record.selected_panels, Some(panels));

    // A terminal record never transitions again.
    assert!(!SelectionRunRepo::complete(&pool, task_id, None).await.unwrap());
    assert!(!SelectionRunRepo::fail(&pool, task_id, "late failure").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn terminal_record_log_never_grows(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Load).await;
    SelectionRunRepo::append_log_line(&pool, task_id, "only line").await.unwrap();
    SelectionRunRepo::complete(&pool, task_id, None).await.unwrap();

    SelectionRunRepo::append_log_line(&pool, task_id, "after the end").await.unwrap();

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.log_lines(), vec!["only line"]);
    assert_eq!(record.status_id, RunStatus::Completed.id());
}

#[sqlx::test(migrations = "./migrations")]
async fn fail_records_message_and_log_line(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Select).await;
    SelectionRunRepo::append_log_line(&pool, task_id, "Loaded 50 people").await.unwrap();

    assert!(
        SelectionRunRepo::fail(&pool, task_id, "Selection infeasible: quota unmet")
            .await
            .unwrap()
    );

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Failed.id());
    assert_eq!(
        record.error_message.as_deref(),
        Some("Selection infeasible: quota unmet")
    );
    assert!(record.completed_at.is_some());
    // Partial progress is preserved ahead of the failure line.
    assert_eq!(
        record.log_lines(),
        vec!["Loaded 50 people", "Selection infeasible: quota unmet"]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn report_entries_append_in_stage_order(pool: PgPool) {
    let task_id = create_run(&pool, RunTaskType::Select).await;

    SelectionRunRepo::append_report_entries(
        &pool,
        task_id,
        &serde_json::json!([{ "severity": "info", "message": "load ok" }]),
    )
    .await
    .unwrap();
    SelectionRunRepo::append_report_entries(
        &pool,
        task_id,
        &serde_json::json!([{ "severity": "warning", "message": "2 share an address" }]),
    )
    .await
    .unwrap();

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    let entries = record.run_report["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["message"], "load ok");
    assert_eq!(entries[1]["message"], "2 share an address");
}

#[sqlx::test(migrations = "./migrations")]
async fn list_active_excludes_terminal_records(pool: PgPool) {
    let active = create_run(&pool, RunTaskType::Load).await;
    let finished = create_run(&pool, RunTaskType::Load).await;
    SelectionRunRepo::complete(&pool, finished, None).await.unwrap();

    let records = SelectionRunRepo::list_active(&pool).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.task_id).collect();
    assert!(ids.contains(&active));
    assert!(!ids.contains(&finished));
}
