// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter: a message whose executor keeps failing transiently is
//! redelivered until `max_receive`, then dropped with an event.

use crate::prelude::*;
use quaero_engine::QueueConfig;

#[tokio::test]
async fn transient_failures_exhaust_into_dead_letter() {
    let engine = TestEngine::start_with(QueueConfig {
        poll_interval: Duration::from_millis(25),
        visibility_timeout: Duration::from_secs(1),
        max_receive: 2,
        ..QueueConfig::default()
    })
    .await;

    let parent = engine.spawn_parent().await;
    let child = engine
        .spawn_child(&parent, serde_json::json!({ "fail_transient": true }))
        .await;

    // Two allowed deliveries fail; the third receive attempt dead-letters.
    let child_for_wait = child.clone();
    assert!(
        engine
            .recorder
            .wait_until(Duration::from_secs(15), move |events| {
                events.iter().any(|e| matches!(
                    e,
                    Event::DeadLetter { job_id, .. } if *job_id == child_for_wait
                ))
            })
            .await,
        "no dead_letter event observed"
    );

    assert!(engine.wait_for_drain(WAIT).await);

    // The job was never completed by anyone; it is stuck running until
    // an operator intervenes — exactly the at-least-once contract.
    let job = engine.manager.get_job(&child).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);

    engine.shutdown().await;
}
