// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parent/child orchestrator.
//!
//! Subscribes to `job_status_change` and recomputes parent progress on
//! every child transition; a 30-second backup poll reconciles parents
//! whose events were lost. Both paths are required: the subscription
//! gives immediacy, the poll gives safety.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::manager::JobManager;
use quaero_core::{ChildStats, Clock, Event, JobId, JobStatus, LogLevel};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval of the backup poll. Deliberately long — event delivery is
/// normally immediate, the poll only papers over dropped events.
pub const BACKUP_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Aggregates child status into parent progress and terminal state.
pub struct Orchestrator {
    manager: Arc<JobManager>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(manager: Arc<JobManager>, bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self { manager, bus, clock, poll_interval: BACKUP_POLL_INTERVAL }
    }

    /// Shorter poll for tests.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Subscribe to child status changes and launch the backup poll.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let subscriber = Arc::clone(&self);
        self.bus.subscribe(quaero_core::EventKind::JobStatusChange, move |event| {
            let orchestrator = Arc::clone(&subscriber);
            async move {
                orchestrator.handle_status_change(event).await;
            }
        });

        let poller = Arc::clone(&self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poller.poll_interval) => {
                        poller.backup_poll().await;
                    }
                }
            }
        })
    }

    async fn handle_status_change(&self, event: Event) {
        let Event::JobStatusChange { job_id, status, parent_id, .. } = event else {
            return;
        };
        // Parent transitions and standalone jobs carry no parent_id.
        let Some(parent_id) = parent_id else {
            return;
        };

        if let Err(e) = self.reconcile(&parent_id, Some((&job_id, status))).await {
            tracing::warn!(parent_id = %parent_id, error = %e, "failed to reconcile parent after child change");
        }
    }

    /// Safety net: reconcile every non-terminal parent.
    async fn backup_poll(&self) {
        let parents = match self.manager.active_parents().await {
            Ok(parents) => parents,
            Err(e) => {
                tracing::warn!(error = %e, "backup poll could not list parents");
                return;
            }
        };

        for parent in parents {
            if let Err(e) = self.reconcile(&parent.id, None).await {
                tracing::warn!(parent_id = %parent.id, error = %e, "backup poll reconcile failed");
            }
        }
    }

    /// Recompute one parent's aggregate state and publish it. When a
    /// concrete child transition triggered the call, it is recorded in
    /// the parent's log.
    async fn reconcile(
        &self,
        parent_id: &JobId,
        child: Option<(&JobId, JobStatus)>,
    ) -> Result<(), EngineError> {
        let stats = self.manager.get_child_job_stats(parent_id).await?;
        let progress = stats.progress_text();

        if let Some((child_id, status)) = child {
            self.manager
                .add_job_log(
                    parent_id,
                    LogLevel::Info,
                    format!("Child job {} → {}. {}", child_id.short(12), status, progress),
                )
                .await;
            if status == JobStatus::Failed {
                self.enforce_error_tolerance(parent_id, &stats).await;
            }
        }

        self.publish_progress(parent_id, &stats);

        let overall = stats.overall_status();
        if overall.is_terminal() {
            self.finish_parent(parent_id, overall, &stats).await?;
        }
        Ok(())
    }

    /// Apply the run's error-tolerance policy after a child failure.
    ///
    /// Absent a policy, siblings keep running (failure still dominates
    /// the final parent status). A policy with `continue_on_error =
    /// false`, or an exceeded `max_failures`, cancels the children that
    /// have not started yet; running children finish on their own.
    async fn enforce_error_tolerance(&self, parent_id: &JobId, stats: &ChildStats) {
        let parent = match self.manager.get_job(parent_id).await {
            Ok(parent) => parent,
            Err(_) => return,
        };
        let Some(tolerance) = parent.metadata.get("error_tolerance") else {
            return;
        };
        let Ok(tolerance) =
            serde_json::from_value::<quaero_definitions::ErrorTolerance>(tolerance.clone())
        else {
            return;
        };

        let over_budget =
            tolerance.max_failures.is_some_and(|max| stats.failed >= max as u64);
        if tolerance.continue_on_error && !over_budget {
            return;
        }

        let children = match self.manager.get_child_jobs(parent_id).await {
            Ok(children) => children,
            Err(_) => return,
        };
        for child in children.iter().filter(|c| c.status == JobStatus::Pending) {
            match self.manager.update_job_status(&child.id, JobStatus::Cancelled, None).await {
                Ok(()) => {}
                Err(e) if e.is_terminal_transition() => {}
                Err(e) => {
                    tracing::warn!(child_id = %child.id, error = %e, "failed to cancel pending sibling");
                }
            }
        }
        self.manager
            .add_job_log(
                parent_id,
                LogLevel::Warn,
                format!("Error tolerance exceeded ({} failed); cancelled pending steps", stats.failed),
            )
            .await;
    }

    fn publish_progress(&self, parent_id: &JobId, stats: &ChildStats) {
        self.bus.publish(Event::child_stats(parent_id.clone(), stats));
        self.bus
            .publish(Event::parent_progress(parent_id.clone(), stats, self.clock.epoch_secs()));
    }

    async fn finish_parent(
        &self,
        parent_id: &JobId,
        overall: JobStatus,
        stats: &ChildStats,
    ) -> Result<(), EngineError> {
        let error = match overall {
            JobStatus::Failed => Some(format!("{} child job(s) failed", stats.failed)),
            _ => None,
        };

        match self.manager.update_job_status(parent_id, overall, error.as_deref()).await {
            Ok(()) => {
                tracing::info!(parent_id = %parent_id, status = %overall, "parent reached terminal status");
                Ok(())
            }
            // Another path (event + poll racing) already finished it.
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(EngineError::JobNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
