// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status machine.
//!
//! A job is one unit of work with durable state. Parent jobs own child
//! jobs through `parent_id`; a parent's terminal status is derived from
//! its children's aggregate counts ([`ChildStats::overall_status`]).

use crate::clock::Clock;
use crate::id::JobId;
use serde::{Deserialize, Serialize};

/// Execution status of a job.
///
/// `pending → running` happens once; the terminal states
/// (`completed`, `failed`, `cancelled`) are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// Error returned when a status string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Discriminator between orchestrating parents and leaf children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Parent,
    Child,
}

crate::simple_display! {
    JobKind {
        Parent => "parent",
        Child => "child",
    }
}

impl std::str::FromStr for JobKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(JobKind::Parent),
            "child" => Ok(JobKind::Child),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// One unit of work with durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Executor key, e.g. `crawler_url`, `agent_step`, or `parent`.
    pub job_type: String,
    pub kind: JobKind,
    pub parent_id: Option<JobId>,
    pub status: JobStatus,
    /// Executor-specific configuration bag.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Cross-reference bag (e.g. `job_definition_id`).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Epoch seconds.
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub last_heartbeat: Option<i64>,
    pub error_message: Option<String>,
}

impl Job {
    /// Create a pending parent job.
    pub fn parent(clock: &impl Clock) -> Self {
        Self {
            id: JobId::new(),
            job_type: "parent".to_string(),
            kind: JobKind::Parent,
            parent_id: None,
            status: JobStatus::Pending,
            config: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
            created_at: clock.epoch_secs(),
            started_at: None,
            completed_at: None,
            last_heartbeat: None,
            error_message: None,
        }
    }

    /// Create a pending child job under `parent_id`.
    pub fn child(job_type: impl Into<String>, parent_id: JobId, clock: &impl Clock) -> Self {
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            kind: JobKind::Child,
            parent_id: Some(parent_id),
            status: JobStatus::Pending,
            config: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
            created_at: clock.epoch_secs(),
            started_at: None,
            completed_at: None,
            last_heartbeat: None,
            error_message: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fetch a string field from the metadata bag.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// The definition this job was instantiated from, if any.
    pub fn definition_id(&self) -> Option<&str> {
        self.metadata_str("job_definition_id")
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            job_type: String = "test_step",
        }
        set {
            id: JobId = JobId::new(),
            kind: JobKind = JobKind::Child,
            status: JobStatus = JobStatus::Pending,
            config: serde_json::Value = serde_json::Value::Null,
            metadata: serde_json::Value = serde_json::Value::Null,
            created_at: i64 = 0,
        }
        option {
            parent_id: JobId = None,
            started_at: i64 = None,
            completed_at: i64 = None,
            last_heartbeat: i64 = None,
            error_message: String = None,
        }
    }
}

/// Aggregate status counts of one parent's children.
///
/// Produced by a single GROUP BY query; the counts are a snapshot and may
/// be stale by the time they are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildStats {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl ChildStats {
    /// Number of children in a terminal state.
    pub fn terminal(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }

    /// Human-readable progress line pushed to the UI verbatim.
    pub fn progress_text(&self) -> String {
        format!(
            "{} pending, {} running, {} completed, {} failed",
            self.pending, self.running, self.completed, self.failed
        )
    }

    /// Derive the parent's overall status from child counts.
    ///
    /// Rules, in order:
    /// - no children yet: the parent is still orchestrating (`running`)
    /// - any pending or running child: `running`
    /// - counts inconsistent (terminal < total): `running`
    /// - any failed child: `failed`
    /// - all children cancelled: `cancelled`
    /// - otherwise: `completed`
    pub fn overall_status(&self) -> JobStatus {
        if self.total == 0 {
            return JobStatus::Running;
        }
        if self.running > 0 || self.pending > 0 {
            return JobStatus::Running;
        }
        if self.terminal() < self.total {
            return JobStatus::Running;
        }
        if self.failed > 0 {
            return JobStatus::Failed;
        }
        if self.cancelled == self.total {
            return JobStatus::Cancelled;
        }
        JobStatus::Completed
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
