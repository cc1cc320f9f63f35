// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager: the single source of truth for job rows.
//!
//! Status transitions are guarded — terminal states are absorbing — and
//! every committed transition is announced on the event bus. The bus is
//! an optional capability: without one the manager still functions, and
//! the orchestrator's backup poll keeps parents converging.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::logs::LogService;
use parking_lot::RwLock;
use quaero_core::{ChildStats, Clock, Event, Job, JobId, JobKind, JobLogEntry, JobStatus, LogLevel};
use quaero_storage::{
    retry_on_busy, JobFilter, JobStore, StatusUpdate, JOB_WRITE_ATTEMPTS, JOB_WRITE_DELAY,
};
use std::sync::Arc;

/// Owns job rows; everything else reads and writes through here.
pub struct JobManager {
    jobs: JobStore,
    logs: LogService,
    clock: Arc<dyn Clock>,
    bus: RwLock<Option<EventBus>>,
}

impl JobManager {
    pub fn new(jobs: JobStore, logs: LogService, clock: Arc<dyn Clock>) -> Self {
        Self { jobs, logs, clock, bus: RwLock::new(None) }
    }

    /// Attach the event bus after construction. Keeping this optional
    /// breaks the construction cycle between manager, bus, and
    /// orchestrator.
    pub fn attach_bus(&self, bus: EventBus) {
        *self.bus.write() = Some(bus);
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = self.bus.read().as_ref() {
            bus.publish(event);
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn log_service(&self) -> &LogService {
        &self.logs
    }

    /// Persist a new job row and announce it.
    pub async fn create_job(&self, job: &Job) -> Result<JobId, EngineError> {
        retry_on_busy(
            || async { self.jobs.insert(job).await.map_err(EngineError::from) },
            JOB_WRITE_ATTEMPTS,
            JOB_WRITE_DELAY,
        )
        .await?;

        self.publish(Event::JobCreated {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            kind: job.kind,
            parent_id: job.parent_id.clone(),
        });
        Ok(job.id.clone())
    }

    pub async fn get_job(&self, id: &JobId) -> Result<Job, EngineError> {
        self.jobs
            .get(id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(id.clone()))
    }

    /// Update mutable fields (config, metadata, heartbeat, error text).
    pub async fn update_job(&self, job: &Job) -> Result<(), EngineError> {
        retry_on_busy(
            || async { self.jobs.update(job).await.map_err(EngineError::from) },
            JOB_WRITE_ATTEMPTS,
            JOB_WRITE_DELAY,
        )
        .await
    }

    /// Best-effort liveness stamp from a running executor.
    pub async fn touch_heartbeat(&self, id: &JobId) {
        let now = self.clock.epoch_secs();
        if let Err(e) = self.jobs.touch_heartbeat(id, now).await {
            tracing::debug!(job_id = %id, error = %e, "heartbeat update failed");
        }
    }

    /// Apply a status transition.
    ///
    /// Enforces terminal immutability: moving a terminal job returns
    /// [`EngineError::TerminalTransition`] so misordered events are
    /// detectable. After a successful commit the transition is logged on
    /// the job and published asynchronously.
    pub async fn update_job_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), EngineError> {
        // One read up front for the event payload (kind, parent).
        let job = self.get_job(id).await?;

        let now = self.clock.epoch_secs();
        let outcome = retry_on_busy(
            || async {
                self.jobs
                    .update_status(id, status, error, now)
                    .await
                    .map_err(EngineError::from)
            },
            JOB_WRITE_ATTEMPTS,
            JOB_WRITE_DELAY,
        )
        .await?;

        match outcome {
            StatusUpdate::Applied => {}
            StatusUpdate::NotFound => return Err(EngineError::JobNotFound(id.clone())),
            StatusUpdate::AlreadyTerminal(current) => {
                tracing::warn!(job_id = %id, current = %current, requested = %status, "rejected terminal transition");
                return Err(EngineError::TerminalTransition {
                    job_id: id.clone(),
                    current,
                    requested: status,
                });
            }
        }

        self.add_job_log(id, LogLevel::Info, format!("Status changed: {status}")).await;

        self.publish(Event::JobStatusChange {
            job_id: id.clone(),
            status,
            kind: job.kind,
            parent_id: job.parent_id.clone(),
        });
        match status {
            JobStatus::Running => self.publish(Event::JobStarted { job_id: id.clone() }),
            JobStatus::Completed => self.publish(Event::JobCompleted { job_id: id.clone() }),
            JobStatus::Failed => self.publish(Event::JobFailed {
                job_id: id.clone(),
                error: error.unwrap_or("unknown error").to_string(),
            }),
            _ => {}
        }

        Ok(())
    }

    pub async fn get_child_jobs(&self, parent: &JobId) -> Result<Vec<Job>, EngineError> {
        Ok(self.jobs.children(parent).await?)
    }

    /// Single aggregate query over child statuses — no per-child reads.
    pub async fn get_child_job_stats(&self, parent: &JobId) -> Result<ChildStats, EngineError> {
        Ok(self.jobs.child_stats(parent).await?)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, EngineError> {
        Ok(self.jobs.list(filter).await?)
    }

    pub async fn active_parents(&self) -> Result<Vec<Job>, EngineError> {
        Ok(self.jobs.active_parents().await?)
    }

    /// Delete a job; children and log rows cascade with it.
    pub async fn delete_job(&self, id: &JobId) -> Result<(), EngineError> {
        self.logs.flush().await;
        let deleted = retry_on_busy(
            || async { self.jobs.delete(id).await.map_err(EngineError::from) },
            JOB_WRITE_ATTEMPTS,
            JOB_WRITE_DELAY,
        )
        .await?;
        if !deleted {
            return Err(EngineError::JobNotFound(id.clone()));
        }
        Ok(())
    }

    /// Cancel a job. For a parent, non-terminal children are cancelled
    /// first; terminal transitions that race with the orchestrator are
    /// absorbed as no-ops.
    pub async fn cancel_job(&self, id: &JobId) -> Result<(), EngineError> {
        let job = self.get_job(id).await?;

        if job.kind == JobKind::Parent {
            for child in self.get_child_jobs(id).await? {
                if child.status.is_terminal() {
                    continue;
                }
                match self.update_job_status(&child.id, JobStatus::Cancelled, None).await {
                    Ok(()) => {}
                    Err(e) if e.is_terminal_transition() => {}
                    Err(e) => return Err(e),
                }
            }
        }

        match self.update_job_status(id, JobStatus::Cancelled, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Append a log entry for a job. Never fails the caller — log
    /// problems must not break status flows.
    pub async fn add_job_log(&self, id: &JobId, level: LogLevel, message: impl Into<String>) {
        let entry = JobLogEntry::new(id.clone(), level, message, self.clock.epoch_ms());
        self.logs.append(entry);
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
