// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent step executor: one turn of an LLM-driven loop per message.
//!
//! The LLM itself sits behind the [`AgentClient`] seam — concrete
//! adapters live outside the orchestration core. A turn either finishes
//! the loop (final answer or exhausted budget) or enqueues the next
//! step as a sibling child job carrying the grown transcript.

use crate::error::EngineError;
use crate::manager::JobManager;
use crate::queue::QueueService;
use crate::registry::{ExecutionContext, JobExecutor};
use async_trait::async_trait;
use quaero_core::{Clock, Job, JobMessage, JobStatus, LogLevel};
use quaero_storage::{retry_on_busy, CHILD_CREATE_ATTEMPTS, CHILD_CREATE_DELAY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const WORKER_TYPE: &str = "agent_step";

/// One request to the LLM adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurnRequest {
    pub prompt: String,
    /// Prior turns, oldest first.
    pub transcript: Vec<String>,
    pub model: Option<String>,
}

/// The adapter's reply for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurnResponse {
    pub text: String,
    /// True when the agent produced its final answer and the loop ends.
    pub final_answer: bool,
}

/// Boundary to the LLM. Implementations are injected at startup;
/// the engine never talks to a provider directly.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn complete(&self, request: AgentTurnRequest) -> Result<AgentTurnResponse, EngineError>;
}

fn default_max_steps() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentStepConfig {
    prompt: String,
    #[serde(default)]
    step: u32,
    #[serde(default = "default_max_steps")]
    max_steps: u32,
    #[serde(default)]
    transcript: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

/// Runs one agent turn per queue message.
pub struct AgentStepExecutor {
    manager: Arc<JobManager>,
    queue: Arc<QueueService>,
    client: Arc<dyn AgentClient>,
    clock: Arc<dyn Clock>,
}

impl AgentStepExecutor {
    pub fn new(
        manager: Arc<JobManager>,
        queue: Arc<QueueService>,
        client: Arc<dyn AgentClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { manager, queue, client, clock }
    }

    fn parse_config(message: &JobMessage) -> Result<AgentStepConfig, EngineError> {
        serde_json::from_value(message.config.clone())
            .map_err(|e| EngineError::Validation(format!("bad agent_step config: {e}")))
    }

    async fn record_result(&self, message: &JobMessage, text: &str) -> Result<(), EngineError> {
        let mut job = self.manager.get_job(&message.job_id).await?;
        if !job.metadata.is_object() {
            job.metadata = serde_json::json!({});
        }
        job.metadata["result"] = serde_json::Value::String(text.to_string());
        self.manager.update_job(&job).await
    }

    async fn enqueue_next(
        &self,
        message: &JobMessage,
        config: AgentStepConfig,
    ) -> Result<(), EngineError> {
        let parent = message.parent_id.clone().unwrap_or_else(|| message.job_id.clone());
        let next = Job::child(WORKER_TYPE, parent, &self.clock)
            .with_config(serde_json::to_value(&config)?)
            .with_metadata(message.metadata.clone());

        retry_on_busy(
            || async { self.manager.create_job(&next).await.map(|_| ()) },
            CHILD_CREATE_ATTEMPTS,
            CHILD_CREATE_DELAY,
        )
        .await?;

        let next_message =
            JobMessage::for_job(&next, self.clock.epoch_secs()).with_depth(message.depth + 1);
        self.queue.enqueue(&next_message).await?;
        Ok(())
    }

    async fn finish(&self, message: &JobMessage) -> Result<(), EngineError> {
        match self.manager.update_job_status(&message.job_id, JobStatus::Completed, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl JobExecutor for AgentStepExecutor {
    fn worker_type(&self) -> &str {
        WORKER_TYPE
    }

    fn validate(&self, message: &JobMessage) -> Result<(), EngineError> {
        let config = Self::parse_config(message)?;
        if config.prompt.trim().is_empty() {
            return Err(EngineError::Validation("agent_step prompt is empty".into()));
        }
        if config.step >= config.max_steps {
            return Err(EngineError::Validation(format!(
                "agent_step step {} exceeds budget {}",
                config.step, config.max_steps
            )));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError> {
        let mut config = Self::parse_config(message)?;
        if ctx.is_cancelled() {
            return Err(EngineError::Executor("cancelled before agent turn".into()));
        }

        let response = self
            .client
            .complete(AgentTurnRequest {
                prompt: config.prompt.clone(),
                transcript: config.transcript.clone(),
                model: config.model.clone(),
            })
            .await?;

        config.transcript.push(response.text.clone());
        self.manager.touch_heartbeat(&message.job_id).await;

        let budget_exhausted = config.step + 1 >= config.max_steps;
        if response.final_answer || budget_exhausted {
            let reason = if response.final_answer { "final answer" } else { "step budget exhausted" };
            self.manager
                .add_job_log(
                    &message.job_id,
                    LogLevel::Info,
                    format!("Agent loop finished after step {} ({reason})", config.step + 1),
                )
                .await;
            self.record_result(message, &response.text).await?;
        } else {
            config.step += 1;
            self.enqueue_next(message, config).await?;
        }

        self.finish(message).await
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
