// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::FakeClock;
use proptest::prelude::*;
use yare::parameterized;

#[test]
fn status_terminality() {
    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::Cancelled.is_terminal());

    assert!(JobStatus::Pending.is_active());
    assert!(!JobStatus::Completed.is_active());
}

#[test]
fn status_round_trips_through_strings() {
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        let parsed: JobStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert!("bogus".parse::<JobStatus>().is_err());
}

#[test]
fn child_carries_parent_reference() {
    let clock = FakeClock::new();
    let parent = Job::parent(&clock);
    let child = Job::child("crawler_url", parent.id.clone(), &clock);

    assert_eq!(parent.kind, JobKind::Parent);
    assert_eq!(parent.status, JobStatus::Pending);
    assert!(parent.parent_id.is_none());

    assert_eq!(child.kind, JobKind::Child);
    assert_eq!(child.parent_id.as_ref(), Some(&parent.id));
    assert_eq!(child.job_type, "crawler_url");
}

#[test]
fn builder_defaults_make_a_pending_child() {
    let job = Job::builder().build();
    assert_eq!(job.job_type, "test_step");
    assert_eq!(job.kind, JobKind::Child);
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.parent_id.is_none());

    let parent = JobId::new();
    let job = Job::builder()
        .job_type("crawler_url")
        .parent_id(parent.clone())
        .status(JobStatus::Running)
        .started_at(5)
        .build();
    assert_eq!(job.job_type, "crawler_url");
    assert_eq!(job.parent_id, Some(parent));
    assert_eq!(job.started_at, Some(5));
}

#[test]
fn metadata_lookup() {
    let clock = FakeClock::new();
    let job = Job::parent(&clock)
        .with_metadata(serde_json::json!({ "job_definition_id": "def-abc" }));

    assert_eq!(job.definition_id(), Some("def-abc"));
    assert_eq!(job.metadata_str("missing"), None);
}

fn stats(pending: u64, running: u64, completed: u64, failed: u64, cancelled: u64) -> ChildStats {
    ChildStats {
        total: pending + running + completed + failed + cancelled,
        pending,
        running,
        completed,
        failed,
        cancelled,
    }
}

#[parameterized(
    no_children = { stats(0, 0, 0, 0, 0), JobStatus::Running },
    pending_only = { stats(3, 0, 0, 0, 0), JobStatus::Running },
    running_wins_over_terminal = { stats(0, 1, 1, 1, 0), JobStatus::Running },
    all_completed = { stats(0, 0, 4, 0, 0), JobStatus::Completed },
    failure_dominates = { stats(0, 0, 2, 1, 0), JobStatus::Failed },
    failure_dominates_cancelled = { stats(0, 0, 0, 1, 2), JobStatus::Failed },
    all_cancelled = { stats(0, 0, 0, 0, 3), JobStatus::Cancelled },
    cancelled_mixed_with_completed = { stats(0, 0, 1, 0, 2), JobStatus::Completed },
)]
fn overall_status_cases(stats: ChildStats, expected: JobStatus) {
    assert_eq!(stats.overall_status(), expected);
}

#[test]
fn overall_status_guards_inconsistent_counts() {
    // total larger than the sum of buckets: treat as still running
    let stats = ChildStats { total: 5, completed: 2, ..Default::default() };
    assert_eq!(stats.overall_status(), JobStatus::Running);
}

#[test]
fn progress_text_format() {
    let stats = stats(1, 2, 3, 4, 0);
    assert_eq!(stats.progress_text(), "1 pending, 2 running, 3 completed, 4 failed");
}

proptest! {
    /// overall_status is a pure function of the counts.
    #[test]
    fn overall_status_is_deterministic(
        pending in 0u64..20,
        running in 0u64..20,
        completed in 0u64..20,
        failed in 0u64..20,
        cancelled in 0u64..20,
    ) {
        let s = stats(pending, running, completed, failed, cancelled);
        prop_assert_eq!(s.overall_status(), s.overall_status());
    }

    /// A parent only goes terminal when every child is terminal.
    #[test]
    fn terminal_requires_all_children_terminal(
        pending in 0u64..20,
        running in 0u64..20,
        completed in 0u64..20,
        failed in 0u64..20,
        cancelled in 0u64..20,
    ) {
        let s = stats(pending, running, completed, failed, cancelled);
        let overall = s.overall_status();
        if overall.is_terminal() {
            prop_assert_eq!(s.terminal(), s.total);
            prop_assert!(s.total > 0);
        }
    }

    /// Any failed child forces a failed parent once all children are terminal.
    #[test]
    fn failure_dominates_terminal_sets(
        completed in 0u64..20,
        failed in 1u64..20,
        cancelled in 0u64..20,
    ) {
        let s = stats(0, 0, completed, failed, cancelled);
        prop_assert_eq!(s.overall_status(), JobStatus::Failed);
    }
}
