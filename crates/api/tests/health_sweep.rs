//! Health-monitor reconciliation tests.

mod common;

use std::sync::Arc;

use sortia_api::background::health;
use sortia_api::engine::dispatch::{dispatch_run, DispatchRequest};
use sortia_core::task::RunTaskType;
use sortia_db::models::selection_run::NewSelectionRun;
use sortia_db::models::status::RunStatus;
use sortia_db::repositories::{QueueJobRepo, SelectionRunRepo};
use sortia_queue::pg::PgTaskQueue;
use sortia_queue::TaskQueue;
use sqlx::PgPool;

use common::{seed_assembly, seed_manager};

const ACTOR: i64 = 7;

async fn dispatch_load(pool: &PgPool, queue: &dyn TaskQueue) -> sortia_core::types::TaskId {
    let assembly_id = seed_assembly(pool, true).await;
    seed_manager(pool, assembly_id, ACTOR).await;
    dispatch_run(
        pool,
        queue,
        DispatchRequest {
            assembly_id,
            actor_id: ACTOR,
            task_type: RunTaskType::Load,
            target_count: None,
        },
    )
    .await
    .unwrap()
}

/// Simulate the hard-crash scenario: a worker claims the job, the record
/// reaches RUNNING, then the worker dies (its heartbeat goes stale).
async fn crash_claimed_worker(pool: &PgPool, task_id: sortia_core::types::TaskId) {
    let worker = QueueJobRepo::register_worker(pool, "doomed-worker").await.unwrap();
    QueueJobRepo::claim_next(pool, worker.id).await.unwrap().unwrap();
    SelectionRunRepo::mark_running(pool, task_id).await.unwrap();
    SelectionRunRepo::append_log_line(pool, task_id, "Loading criteria from tab \"Categories\"")
        .await
        .unwrap();
    sqlx::query(
        "UPDATE queue_workers SET last_heartbeat_at = NOW() - INTERVAL '10 minutes' WHERE id = $1",
    )
    .bind(worker.id)
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_leaves_live_runs_alone(pool: PgPool) {
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let task_id = dispatch_load(&pool, queue.as_ref()).await;

    let stats = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(stats.checked, 1);
    assert_eq!(stats.force_failed, 0);

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Pending.id());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn dead_worker_run_is_force_failed_by_the_sweep(pool: PgPool) {
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let task_id = dispatch_load(&pool, queue.as_ref()).await;
    crash_claimed_worker(&pool, task_id).await;

    // Until the sweep runs, the record just looks stuck-RUNNING.
    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Running.id());

    let stats = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(stats.force_failed, 1);

    let record = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status_id, RunStatus::Failed.id());
    assert!(record.completed_at.is_some());
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .contains("marked failed by the health check"));
    // Progress emitted before the crash is preserved.
    assert!(!record.log_lines().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_is_idempotent(pool: PgPool) {
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let task_id = dispatch_load(&pool, queue.as_ref()).await;
    crash_claimed_worker(&pool, task_id).await;

    let first = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(first.force_failed, 1);

    // No intervening state change: the second sweep fails nothing further.
    let second = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(second.force_failed, 0);
    assert_eq!(second.checked, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn check_on_a_terminal_record_is_a_no_op(pool: PgPool) {
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let task_id = dispatch_load(&pool, queue.as_ref()).await;
    SelectionRunRepo::complete(&pool, task_id, None).await.unwrap();

    let before = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();

    assert!(!health::check(&pool, queue.as_ref(), task_id).await.unwrap());

    let after = SelectionRunRepo::find_by_task_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status_id, before.status_id);
    assert_eq!(after.completed_at, before.completed_at);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn never_acknowledged_record_is_reconciled_after_grace(pool: PgPool) {
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let assembly_id = seed_assembly(&pool, true).await;

    // A record that crashed between persist and acknowledge: no external
    // id, submission phase never advanced.
    let record = SelectionRunRepo::create(
        &pool,
        &NewSelectionRun {
            assembly_id,
            user_id: ACTOR,
            task_type: RunTaskType::Load,
            settings_used: serde_json::json!({ "spreadsheet_id": "sheet-1" }),
        },
    )
    .await
    .unwrap();

    // Inside the grace period the sweep leaves it alone.
    let stats = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(stats.force_failed, 0);

    sqlx::query(
        "UPDATE selection_runs SET created_at = NOW() - INTERVAL '10 minutes' WHERE task_id = $1",
    )
    .bind(record.task_id)
    .execute(&pool)
    .await
    .unwrap();

    let stats = health::sweep(&pool, queue.as_ref()).await;
    assert_eq!(stats.force_failed, 1);

    let failed = SelectionRunRepo::find_by_task_id(&pool, record.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status_id, RunStatus::Failed.id());
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("never handed to the background queue"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn poll_endpoint_reconciles_then_reports(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let task_id = dispatch_load(&pool, queue.as_ref()).await;
    crash_claimed_worker(&pool, task_id).await;

    let (status, body) = common::send(
        &app,
        "GET",
        &format!("/api/v1/runs/{task_id}/poll"),
        None,
        None,
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["status"], "failed");
    assert!(body["data"]["error_message"]
        .as_str()
        .unwrap()
        .contains("marked failed by the health check"));
}
