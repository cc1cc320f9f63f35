// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue message payload.

use crate::id::{DefinitionId, JobId};
use crate::job::Job;
use serde::{Deserialize, Serialize};

/// Payload carried by one persistent queue message.
///
/// A message references the job it drives by ID; the job row is the
/// source of truth, the message only carries what the executor needs to
/// start work. Messages may be delivered more than once — consumers must
/// absorb duplicates idempotently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: JobId,
    /// Executor key (`crawler_url`, `agent_step`, …).
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<DefinitionId>,
    /// Crawl/expansion depth of this message relative to its root.
    #[serde(default)]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Epoch seconds at enqueue time.
    pub enqueued_at: i64,
}

impl JobMessage {
    /// Build the message that drives `job`.
    pub fn for_job(job: &Job, enqueued_at: i64) -> Self {
        Self {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            parent_id: job.parent_id.clone(),
            definition_id: job.definition_id().map(DefinitionId::from_string),
            depth: 0,
            url: job.config.get("url").and_then(|v| v.as_str()).map(String::from),
            config: job.config.clone(),
            metadata: job.metadata.clone(),
            enqueued_at,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Serialize for the queue body column.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a queue body column.
    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
