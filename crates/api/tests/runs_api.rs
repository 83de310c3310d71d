//! Dispatch and status endpoint tests.

mod common;

use axum::http::StatusCode;
use sortia_db::models::status::{RunStatus, SubmissionPhase};
use sortia_db::repositories::SelectionRunRepo;
use sqlx::PgPool;
use uuid::Uuid;

use common::{build_test_app, seed_assembly, seed_manager, send};

const ACTOR: i64 = 7;

#[sqlx::test(migrations = "../db/migrations")]
async fn dispatch_select_creates_acknowledged_pending_record(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/select"),
        Some(ACTOR),
        Some(serde_json::json!({ "target_count": 10 })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id: Uuid = body["data"]["task_id"].as_str().unwrap().parse().unwrap();

    // Dispatch returned: the record is PENDING with a non-null external id.
    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Pending.id());
    assert!(record.external_job_id.is_some());
    assert_eq!(record.submission_phase, SubmissionPhase::Acknowledged.id());
    assert_eq!(record.task_type, "SELECT");
    assert_eq!(record.user_id, ACTOR);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn settings_snapshot_survives_later_assembly_edits(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
        Some(ACTOR),
        None,
    )
    .await;
    let task_id: Uuid = body["data"]["task_id"].as_str().unwrap().parse().unwrap();

    // Edit the live settings after dispatch.
    sqlx::query(
        "UPDATE assemblies SET source_settings = jsonb_set(source_settings, '{spreadsheet_id}', '\"edited\"') WHERE id = $1",
    )
    .bind(assembly_id)
    .execute(&pool)
    .await
    .unwrap();

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.settings_used["spreadsheet_id"], "sheet-1");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_assembly_is_404(pool: PgPool) {
    let app = build_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/assemblies/9999/runs/load",
        Some(ACTOR),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn non_manager_is_403_and_no_record_is_created(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    // No seed_manager call: the actor has no capability.

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/select"),
        Some(ACTOR),
        Some(serde_json::json!({ "target_count": 10 })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM selection_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_source_settings_is_rejected_before_persistence(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, false).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
        Some(ACTOR),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM selection_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn zero_target_count_is_rejected(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/select"),
        Some(ACTOR),
        Some(serde_json::json!({ "target_count": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_actor_header_is_401(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn run_history_lists_newest_first(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    for _ in 0..2 {
        send(
            &app,
            "POST",
            &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
            Some(ACTOR),
            None,
        )
        .await;
    }

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/assemblies/{assembly_id}/runs"),
        Some(ACTOR),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // The capability check applies to the history view too.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/assemblies/{assembly_id}/runs"),
        Some(999),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_for_unknown_task_is_an_empty_view(pool: PgPool) {
    let app = build_test_app(pool.clone());

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/runs/{}", Uuid::now_v7()),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["found"], false);
    assert_eq!(body["data"]["log_messages"], serde_json::json!([]));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_for_dispatched_run_is_pending(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
        Some(ACTOR),
        None,
    )
    .await;
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/api/v1/runs/{task_id}"), None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["found"], true);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["task_type"], "LOAD");
    assert!(body["data"]["outcome"].is_null());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn poll_leaves_a_freshly_dispatched_run_alone(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let assembly_id = seed_assembly(&pool, true).await;
    seed_manager(&pool, assembly_id, ACTOR).await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/assemblies/{assembly_id}/runs/load"),
        Some(ACTOR),
        None,
    )
    .await;
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/runs/{task_id}/poll"),
        None,
        None,
    )
    .await;

    // Substrate still reports the job as pending, so no force-fail.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
}
