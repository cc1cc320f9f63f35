// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::TestEngine;
use quaero_core::{Job, JobMessage};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn successful_execution_completes_job_and_deletes_message() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;

    assert!(engine.wait_for_status(&child, JobStatus::Completed, WAIT).await);
    assert!(engine.wait_for_drain(WAIT).await);

    engine.shutdown().await;
}

#[tokio::test]
async fn scripted_failure_marks_job_failed() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({ "fail": true })).await;

    assert!(engine.wait_for_status(&child, JobStatus::Failed, WAIT).await);
    assert!(engine.wait_for_drain(WAIT).await);
    let job = engine.manager.get_job(&child).await.unwrap();
    assert_eq!(job.error_message.as_deref(), Some("scripted failure"));

    engine.shutdown().await;
}

#[tokio::test]
async fn validation_failure_fails_job_and_consumes_message() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({ "invalid": true })).await;

    assert!(engine.wait_for_status(&child, JobStatus::Failed, WAIT).await);
    assert!(engine.wait_for_drain(WAIT).await);
    let job = engine.manager.get_job(&child).await.unwrap();
    assert!(job.error_message.unwrap().contains("validation failed"));
    // Validation failures never reach execution.
    assert!(job.started_at.is_none());

    engine.shutdown().await;
}

#[tokio::test]
async fn unknown_message_type_is_logged_and_deleted() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = Job::child("unregistered_type", parent.clone(), &engine.clock);
    engine.manager.create_job(&child).await.unwrap();
    let message = JobMessage::for_job(&child, engine.clock.epoch_secs());
    engine.queue.enqueue(&message).await.unwrap();

    assert!(engine.wait_for_drain(WAIT).await);
    // The job row is untouched — nothing could run it.
    let job = engine.manager.get_job(&child.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    engine.shutdown().await;
}

#[tokio::test]
async fn transient_failure_leaves_message_for_redelivery() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine
        .spawn_child(&parent, serde_json::json!({ "fail_transient": true }))
        .await;

    // The job ran (running stamp) but the message survived the attempt.
    assert!(engine.wait_for_status(&child, JobStatus::Running, WAIT).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.queue.depth().await.unwrap(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn message_for_terminal_job_is_absorbed() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    // Cancel before the message lands: the worker must drop it as a no-op.
    let child = Job::child("test_step", parent.clone(), &engine.clock);
    engine.manager.create_job(&child).await.unwrap();
    engine
        .manager
        .update_job_status(&child.id, JobStatus::Cancelled, None)
        .await
        .unwrap();

    let message = JobMessage::for_job(&child, engine.clock.epoch_secs());
    engine.queue.enqueue(&message).await.unwrap();

    assert!(engine.wait_for_drain(WAIT).await);
    let job = engine.manager.get_job(&child.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);

    engine.shutdown().await;
}

#[tokio::test]
async fn stop_cancels_in_flight_executors_without_deleting_messages() {
    let engine = TestEngine::start().await;

    let parent = engine.spawn_parent().await;
    let child = engine
        .spawn_child(&parent, serde_json::json!({ "delay_ms": 10_000 }))
        .await;

    // Wait until the slow executor picked the message up.
    assert!(engine.wait_for_status(&child, JobStatus::Running, WAIT).await);
    engine.workers.stop(Duration::from_secs(2)).await;

    // The in-flight message was not deleted; it will be redelivered.
    assert_eq!(engine.queue.depth().await.unwrap(), 1);

    engine.shutdown().await;
}
