// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::jobs::JobStore;
use quaero_core::{FakeClock, Job};

async fn fixture() -> (Database, JobStore, LogStore) {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let jobs = JobStore::new(&db);
    let logs = LogStore::new(&db);
    (db, jobs, logs)
}

fn entry(job: &Job, ts: i64, message: &str) -> JobLogEntry {
    JobLogEntry::new(job.id.clone(), LogLevel::Info, message, ts)
}

#[tokio::test]
async fn list_returns_newest_first() {
    let (_db, jobs, logs) = fixture().await;
    let clock = FakeClock::new();
    let job = Job::parent(&clock);
    jobs.insert(&job).await.unwrap();

    logs.append_batch(&[entry(&job, 10, "first"), entry(&job, 20, "second"), entry(&job, 30, "third")])
        .await
        .unwrap();

    let listed = logs.list(&job.id, 2).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].message, "third");
    assert_eq!(listed[1].message, "second");
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (_db, _jobs, logs) = fixture().await;
    logs.append_batch(&[]).await.unwrap();
}

#[tokio::test]
async fn aggregated_merges_descendants_in_time_order() {
    let (_db, jobs, logs) = fixture().await;
    let clock = FakeClock::new();

    let parent = Job::parent(&clock);
    let child_a = Job::child("test_step", parent.id.clone(), &clock);
    let child_b = Job::child("test_step", parent.id.clone(), &clock);
    let grandchild = Job::child("test_step", child_a.id.clone(), &clock);
    for job in [&parent, &child_a, &child_b, &grandchild] {
        jobs.insert(job).await.unwrap();
    }

    logs.append_batch(&[
        entry(&child_a, 20, "a"),
        entry(&parent, 10, "p"),
        entry(&grandchild, 40, "g"),
        entry(&child_b, 30, "b"),
    ])
    .await
    .unwrap();

    let merged = logs.list_aggregated(&parent.id, 100).await.unwrap();
    let messages: Vec<_> = merged.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["p", "a", "b", "g"]);
}

#[tokio::test]
async fn aggregated_excludes_unrelated_jobs() {
    let (_db, jobs, logs) = fixture().await;
    let clock = FakeClock::new();

    let parent = Job::parent(&clock);
    let stranger = Job::parent(&clock);
    jobs.insert(&parent).await.unwrap();
    jobs.insert(&stranger).await.unwrap();

    logs.append_batch(&[entry(&parent, 1, "mine"), entry(&stranger, 2, "theirs")])
        .await
        .unwrap();

    let merged = logs.list_aggregated(&parent.id, 100).await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].message, "mine");
}

#[tokio::test]
async fn correlation_id_round_trips() {
    let (_db, jobs, logs) = fixture().await;
    let clock = FakeClock::new();
    let job = Job::parent(&clock);
    jobs.insert(&job).await.unwrap();

    let entry = JobLogEntry::new(job.id.clone(), LogLevel::Error, "boom", 5)
        .with_correlation_id("corr-9");
    logs.append_batch(std::slice::from_ref(&entry)).await.unwrap();

    let listed = logs.list(&job.id, 10).await.unwrap();
    assert_eq!(listed[0], entry);
    assert_eq!(logs.count(&job.id).await.unwrap(), 1);
}
