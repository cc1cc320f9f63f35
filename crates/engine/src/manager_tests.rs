// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::EventRecorder;
use quaero_core::{EventKind, SystemClock};
use quaero_storage::Database;
use std::time::Duration;

async fn fixture() -> (Arc<JobManager>, EventBus, EventRecorder) {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let logs = LogService::new(quaero_storage::LogStore::new(&db), JobStore::new(&db));
    let manager = Arc::new(JobManager::new(JobStore::new(&db), logs, clock.clone()));

    let bus = EventBus::default();
    let recorder = EventRecorder::attach(&bus);
    manager.attach_bus(bus.clone());
    (manager, bus, recorder)
}

fn parent(manager: &JobManager) -> Job {
    Job::parent(manager.clock())
}

#[tokio::test]
async fn create_job_publishes_job_created() {
    let (manager, _bus, recorder) = fixture().await;
    let job = parent(&manager);
    let id = manager.create_job(&job).await.unwrap();
    assert_eq!(id, job.id);

    assert!(
        recorder
            .wait_until(Duration::from_secs(1), |events| {
                events.iter().any(|e| e.kind() == EventKind::JobCreated)
            })
            .await
    );
}

#[tokio::test]
async fn get_job_distinguishes_not_found() {
    let (manager, _bus, _recorder) = fixture().await;
    let err = manager.get_job(&JobId::from_string("job-ghost")).await.unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(_)));
}

#[tokio::test]
async fn status_change_publishes_and_logs() {
    let (manager, _bus, recorder) = fixture().await;
    let job = parent(&manager);
    manager.create_job(&job).await.unwrap();

    manager.update_job_status(&job.id, JobStatus::Running, None).await.unwrap();

    assert!(
        recorder
            .wait_until(Duration::from_secs(1), |events| {
                events.iter().any(|e| matches!(
                    e,
                    Event::JobStatusChange { job_id, status: JobStatus::Running, .. } if *job_id == job.id
                )) && events.iter().any(|e| e.kind() == EventKind::JobStarted)
            })
            .await
    );

    let logs = manager.log_service().get_logs(&job.id, 10).await.unwrap();
    assert!(logs.iter().any(|l| l.message == "Status changed: running"));
}

#[tokio::test]
async fn second_terminal_transition_is_rejected() {
    let (manager, _bus, recorder) = fixture().await;
    let job = parent(&manager);
    manager.create_job(&job).await.unwrap();

    manager.update_job_status(&job.id, JobStatus::Completed, None).await.unwrap();
    let err = manager.update_job_status(&job.id, JobStatus::Completed, None).await.unwrap_err();
    assert!(err.is_terminal_transition());

    // Only one terminal status-change event went out.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let terminal_changes = recorder
        .of_kind(EventKind::JobStatusChange)
        .into_iter()
        .filter(|e| matches!(e, Event::JobStatusChange { status, .. } if status.is_terminal()))
        .count();
    assert_eq!(terminal_changes, 1);
}

#[tokio::test]
async fn failed_transition_carries_error_event() {
    let (manager, _bus, recorder) = fixture().await;
    let job = parent(&manager);
    manager.create_job(&job).await.unwrap();

    manager.update_job_status(&job.id, JobStatus::Failed, Some("boom")).await.unwrap();

    assert!(
        recorder
            .wait_until(Duration::from_secs(1), |events| {
                events.iter().any(|e| matches!(
                    e,
                    Event::JobFailed { error, .. } if error == "boom"
                ))
            })
            .await
    );
}

#[tokio::test]
async fn child_events_carry_parent_reference() {
    let (manager, _bus, recorder) = fixture().await;
    let parent_job = parent(&manager);
    manager.create_job(&parent_job).await.unwrap();
    let child = Job::child("test_step", parent_job.id.clone(), manager.clock());
    manager.create_job(&child).await.unwrap();

    manager.update_job_status(&child.id, JobStatus::Running, None).await.unwrap();

    let parent_id = parent_job.id.clone();
    assert!(
        recorder
            .wait_until(Duration::from_secs(1), move |events| {
                events.iter().any(|e| matches!(
                    e,
                    Event::JobStatusChange { parent_id: Some(p), .. } if *p == parent_id
                ))
            })
            .await
    );
}

#[tokio::test]
async fn cancel_parent_cancels_children_first() {
    let (manager, _bus, _recorder) = fixture().await;
    let parent_job = parent(&manager);
    manager.create_job(&parent_job).await.unwrap();

    let mut children = Vec::new();
    for _ in 0..3 {
        let child = Job::child("test_step", parent_job.id.clone(), manager.clock());
        manager.create_job(&child).await.unwrap();
        children.push(child);
    }
    // One child already finished; cancellation must not touch it.
    manager.update_job_status(&children[0].id, JobStatus::Completed, None).await.unwrap();

    manager.cancel_job(&parent_job.id).await.unwrap();

    assert_eq!(manager.get_job(&children[0].id).await.unwrap().status, JobStatus::Completed);
    assert_eq!(manager.get_job(&children[1].id).await.unwrap().status, JobStatus::Cancelled);
    assert_eq!(manager.get_job(&children[2].id).await.unwrap().status, JobStatus::Cancelled);
    assert_eq!(manager.get_job(&parent_job.id).await.unwrap().status, JobStatus::Cancelled);

    // Cancelling again is an absorbed no-op.
    manager.cancel_job(&parent_job.id).await.unwrap();
}

#[tokio::test]
async fn delete_job_cascades() {
    let (manager, _bus, _recorder) = fixture().await;
    let parent_job = parent(&manager);
    manager.create_job(&parent_job).await.unwrap();
    let child = Job::child("test_step", parent_job.id.clone(), manager.clock());
    manager.create_job(&child).await.unwrap();
    manager.add_job_log(&child.id, LogLevel::Info, "child line").await;

    manager.delete_job(&parent_job.id).await.unwrap();

    assert!(matches!(
        manager.get_job(&child.id).await.unwrap_err(),
        EngineError::JobNotFound(_)
    ));
    let err = manager.delete_job(&parent_job.id).await.unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(_)));
}

#[tokio::test]
async fn child_stats_flow_through_manager() {
    let (manager, _bus, _recorder) = fixture().await;
    let parent_job = parent(&manager);
    manager.create_job(&parent_job).await.unwrap();
    for _ in 0..2 {
        let child = Job::child("test_step", parent_job.id.clone(), manager.clock());
        manager.create_job(&child).await.unwrap();
    }

    let stats = manager.get_child_job_stats(&parent_job.id).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 2);
    assert_eq!(manager.get_child_jobs(&parent_job.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn manager_without_bus_still_functions() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let logs = LogService::new(quaero_storage::LogStore::new(&db), JobStore::new(&db));
    let manager = JobManager::new(JobStore::new(&db), logs, clock);

    let job = Job::parent(manager.clock());
    manager.create_job(&job).await.unwrap();
    manager.update_job_status(&job.id, JobStatus::Running, None).await.unwrap();
    manager.update_job_status(&job.id, JobStatus::Completed, None).await.unwrap();
    assert_eq!(manager.get_job(&job.id).await.unwrap().status, JobStatus::Completed);
}
