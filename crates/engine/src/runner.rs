// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition execution: turn a job definition into one parent job plus
//! one enqueued child message per step.

use crate::error::EngineError;
use crate::manager::JobManager;
use crate::queue::QueueService;
use quaero_core::{Clock, Job, JobId, JobMessage, JobStatus, LogLevel};
use quaero_definitions::JobDefinition;
use quaero_storage::{retry_on_busy, CHILD_CREATE_ATTEMPTS, CHILD_CREATE_DELAY};
use std::sync::Arc;

/// Creates job instances from definitions. Used by the scheduler, the
/// auto-start pass, and the execute endpoint.
pub struct DefinitionRunner {
    manager: Arc<JobManager>,
    queue: Arc<QueueService>,
    clock: Arc<dyn Clock>,
}

impl DefinitionRunner {
    pub fn new(manager: Arc<JobManager>, queue: Arc<QueueService>, clock: Arc<dyn Clock>) -> Self {
        Self { manager, queue, clock }
    }

    /// Execute a definition: create the parent, create and enqueue every
    /// step as a child job, then mark the parent running. Returns the
    /// parent job id immediately — the work itself drains through the
    /// worker pool.
    pub async fn execute(&self, def: &JobDefinition) -> Result<JobId, EngineError> {
        let mut parent_metadata = serde_json::json!({
            "job_definition_id": def.id.as_str(),
            "definition_name": def.name,
        });
        if let Some(tolerance) = &def.error_tolerance {
            parent_metadata["error_tolerance"] = serde_json::to_value(tolerance)?;
        }

        let parent = Job::parent(&self.clock).with_metadata(parent_metadata);
        let parent_id = self.manager.create_job(&parent).await?;
        self.manager
            .add_job_log(
                &parent_id,
                LogLevel::Info,
                format!("Executing definition '{}' ({} steps)", def.name, def.steps.len()),
            )
            .await;

        for step in def.ordered_steps() {
            let mut config = step.config.clone();
            if let Some(url) = &step.url {
                if !config.is_object() {
                    config = serde_json::json!({});
                }
                config["url"] = serde_json::Value::String(url.clone());
            }

            let child = Job::child(step.step_type.clone(), parent_id.clone(), &self.clock)
                .with_config(config)
                .with_metadata(serde_json::json!({
                    "job_definition_id": def.id.as_str(),
                    "step_name": step.name,
                }));

            // Child creation is the hot path during expansion; retry hard.
            retry_on_busy(
                || async { self.manager.create_job(&child).await.map(|_| ()) },
                CHILD_CREATE_ATTEMPTS,
                CHILD_CREATE_DELAY,
            )
            .await?;

            let message = JobMessage::for_job(&child, self.clock.epoch_secs());
            self.queue.enqueue(&message).await?;
        }

        self.manager.update_job_status(&parent_id, JobStatus::Running, None).await?;
        tracing::info!(parent_id = %parent_id, definition = %def.id, "definition execution started");
        Ok(parent_id)
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
