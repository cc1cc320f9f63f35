// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[tokio::test]
async fn migrate_is_idempotent() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions.len(), MIGRATIONS.len());
}

#[tokio::test]
async fn migrations_create_expected_tables() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();

    for expected in ["jobs", "job_logs", "job_definitions", "queue_messages", "documents"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }
}

#[tokio::test]
async fn open_creates_file_and_reset_wipes_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quaero.db");

    let config = StoreConfig { path: path.clone(), ..Default::default() };
    let db = Database::open(&config).await.unwrap();
    db.migrate().await.unwrap();
    sqlx::query("INSERT INTO jobs (id, type, job_type, status, created_at) VALUES ('job-x', 'parent', 'parent', 'pending', 0)")
        .execute(db.pool())
        .await
        .unwrap();
    drop(db);

    let config = StoreConfig { path, reset_on_startup: true, ..Default::default() };
    let db = Database::open(&config).await.unwrap();
    db.migrate().await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[parameterized(
    vacuum = { "vacuum", MaintenanceOp::Vacuum },
    analyze = { "analyze", MaintenanceOp::Analyze },
    reindex = { "reindex", MaintenanceOp::Reindex },
    optimize = { "optimize", MaintenanceOp::Optimize },
)]
fn maintenance_op_parses(input: &str, expected: MaintenanceOp) {
    let op: MaintenanceOp = input.parse().unwrap();
    assert_eq!(op, expected);
    assert_eq!(op.to_string(), input);
}

#[test]
fn maintenance_op_rejects_unknown() {
    assert!("drop_tables".parse::<MaintenanceOp>().is_err());
}

#[tokio::test]
async fn maintenance_ops_run() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    for op in [MaintenanceOp::Analyze, MaintenanceOp::Reindex, MaintenanceOp::Optimize, MaintenanceOp::Vacuum] {
        db.run_maintenance(op).await.unwrap();
    }
}
