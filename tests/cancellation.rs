// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation: cancelling a parent cancels its children, and late
//! executor completions are absorbed as no-ops on terminal jobs.

use crate::prelude::*;

#[tokio::test]
async fn cancelling_parent_with_running_children() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    // Slow children so cancellation lands mid-execution.
    let a = engine.spawn_child(&parent, serde_json::json!({ "delay_ms": 3_000 })).await;
    let b = engine.spawn_child(&parent, serde_json::json!({ "delay_ms": 3_000 })).await;

    assert!(engine.wait_for_status(&a, JobStatus::Running, WAIT).await);
    assert!(engine.wait_for_status(&b, JobStatus::Running, WAIT).await);

    engine.manager.cancel_job(&parent).await.unwrap();

    assert_eq!(engine.manager.get_job(&a).await.unwrap().status, JobStatus::Cancelled);
    assert_eq!(engine.manager.get_job(&b).await.unwrap().status, JobStatus::Cancelled);
    assert_eq!(engine.manager.get_job(&parent).await.unwrap().status, JobStatus::Cancelled);

    // The slow executors finish eventually; their completion attempts
    // bounce off the terminal rows and the messages drain away.
    assert!(engine.wait_for_drain(WAIT).await);
    assert_eq!(engine.manager.get_job(&a).await.unwrap().status, JobStatus::Cancelled);
    assert_eq!(engine.manager.get_job(&b).await.unwrap().status, JobStatus::Cancelled);

    engine.shutdown().await;
}

#[tokio::test]
async fn cancelled_terminal_status_is_stable() {
    let engine = TestEngine::start().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;

    engine.manager.cancel_job(&parent).await.unwrap();

    // Further transitions are rejected and change nothing.
    let err = engine
        .manager
        .update_job_status(&child, JobStatus::Running, None)
        .await
        .unwrap_err();
    assert!(err.is_terminal_transition());
    assert_eq!(engine.manager.get_job(&child).await.unwrap().status, JobStatus::Cancelled);

    assert!(engine.wait_for_status(&parent, JobStatus::Cancelled, WAIT).await);
    engine.shutdown().await;
}

#[tokio::test]
async fn all_cancelled_children_make_parent_cancelled_not_failed() {
    let engine = TestEngine::start().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    for _ in 0..3 {
        let child = engine.spawn_child(&parent, serde_json::json!({})).await;
        engine.manager.update_job_status(&child, JobStatus::Cancelled, None).await.unwrap();
    }

    assert!(engine.wait_for_status(&parent, JobStatus::Cancelled, WAIT).await);
    engine.shutdown().await;
}
