// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::TestEngine;
use quaero_core::{EventKind, Job};

const WAIT: Duration = Duration::from_secs(5);

fn progress_texts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ParentJobProgress { progress_text, .. } => Some(progress_text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn parent_completes_when_all_children_complete() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    for _ in 0..3 {
        engine.spawn_child(&parent, serde_json::json!({})).await;
    }

    assert!(engine.wait_for_status(&parent, JobStatus::Completed, WAIT).await);
    assert!(engine.wait_for_drain(WAIT).await);

    engine.shutdown().await;
}

#[tokio::test]
async fn failure_dominates_parent_status() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    engine.spawn_child(&parent, serde_json::json!({})).await;
    engine.spawn_child(&parent, serde_json::json!({ "fail": true })).await;
    engine.spawn_child(&parent, serde_json::json!({})).await;

    assert!(engine.wait_for_status(&parent, JobStatus::Failed, WAIT).await);

    let parent_job = engine.manager.get_job(&parent).await.unwrap();
    assert!(parent_job.error_message.unwrap().contains("child job(s) failed"));

    engine.shutdown().await;
}

#[tokio::test]
async fn all_cancelled_children_yield_cancelled_parent() {
    let engine = TestEngine::start().await;
    // No workers racing us: stop them so children stay pending.
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let a = engine.spawn_child(&parent, serde_json::json!({})).await;
    let b = engine.spawn_child(&parent, serde_json::json!({})).await;

    engine.manager.update_job_status(&a, JobStatus::Cancelled, None).await.unwrap();
    engine.manager.update_job_status(&b, JobStatus::Cancelled, None).await.unwrap();

    assert!(engine.wait_for_status(&parent, JobStatus::Cancelled, WAIT).await);
    engine.shutdown().await;
}

#[tokio::test]
async fn progress_events_carry_fresh_counts() {
    let engine = TestEngine::start().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let a = engine.spawn_child(&parent, serde_json::json!({})).await;
    let _b = engine.spawn_child(&parent, serde_json::json!({})).await;

    engine.manager.update_job_status(&a, JobStatus::Running, None).await.unwrap();
    engine.manager.update_job_status(&a, JobStatus::Completed, None).await.unwrap();

    assert!(
        engine
            .recorder
            .wait_until(WAIT, |events| {
                progress_texts(events)
                    .iter()
                    .any(|t| t == "1 pending, 0 running, 1 completed, 0 failed")
            })
            .await
    );

    // Child stats snapshots ride along with progress.
    let stats_events = engine.recorder.of_kind(EventKind::ChildJobStats);
    assert!(!stats_events.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn parent_log_records_child_transitions() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;
    assert!(engine.wait_for_status(&parent, JobStatus::Completed, WAIT).await);

    let logs = engine.logs.get_logs(&parent, 50).await.unwrap();
    let prefix = format!("Child job {}", child.short(12));
    assert!(
        logs.iter().any(|l| l.message.starts_with(&prefix)),
        "no child transition line in parent log: {logs:?}"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn parent_without_children_stays_running() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    engine
        .manager
        .update_job_status(&parent, JobStatus::Running, None)
        .await
        .unwrap();

    // Let a couple of backup polls pass.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let job = engine.manager.get_job(&parent).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);

    engine.shutdown().await;
}

#[tokio::test]
async fn backup_poll_converges_without_events() {
    let engine = TestEngine::start().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = Job::child("test_step", parent.clone(), &engine.clock);

    // Write the child terminal state directly at the storage layer, so
    // no job_status_change event ever fires for it.
    let store = quaero_storage::JobStore::new(&engine.db);
    store.insert(&child).await.unwrap();
    store
        .update_status(&child.id, JobStatus::Completed, None, engine.clock.epoch_secs())
        .await
        .unwrap();

    // Only the 500 ms test backup poll can move the parent now.
    assert!(engine.wait_for_status(&parent, JobStatus::Completed, WAIT).await);

    engine.shutdown().await;
}

#[tokio::test]
async fn error_tolerance_stop_cancels_pending_siblings() {
    let engine = TestEngine::start().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent_job = Job::parent(&engine.clock).with_metadata(serde_json::json!({
        "error_tolerance": { "continue_on_error": false }
    }));
    engine.manager.create_job(&parent_job).await.unwrap();
    let parent = parent_job.id.clone();

    let failing = engine.spawn_child(&parent, serde_json::json!({})).await;
    let pending = engine.spawn_child(&parent, serde_json::json!({})).await;

    engine.manager.update_job_status(&failing, JobStatus::Running, None).await.unwrap();
    engine
        .manager
        .update_job_status(&failing, JobStatus::Failed, Some("boom"))
        .await
        .unwrap();

    assert!(engine.wait_for_status(&pending, JobStatus::Cancelled, WAIT).await);
    assert!(engine.wait_for_status(&parent, JobStatus::Failed, WAIT).await);

    engine.shutdown().await;
}
