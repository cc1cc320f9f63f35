// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use quaero_core::{JobId, JobStatus};
use quaero_storage::{RetryableError, StorageError};
use thiserror::Error;

/// Errors surfaced by the orchestration core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested job does not exist. The HTTP boundary maps this to 404.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Attempt to move a terminal job to a new status. Callers that race
    /// against the orchestrator treat this as idempotent.
    #[error("job {job_id} is already {current}; refusing transition to {requested}")]
    TerminalTransition {
        job_id: JobId,
        current: JobStatus,
        requested: JobStatus,
    },

    /// Input violated a precondition. Maps to 400 at the HTTP boundary.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A typed executor reported failure; the driving message is left
    /// for redelivery.
    #[error("executor failure: {0}")]
    Executor(String),

    #[error("no executor registered for job type '{0}'")]
    ExecutorMissing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Definition(#[from] quaero_definitions::DefinitionError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RetryableError for EngineError {
    fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_busy())
    }
}

impl EngineError {
    /// True when a status transition bounced off a terminal job —
    /// harmless for callers that only need at-least-once semantics.
    pub fn is_terminal_transition(&self) -> bool {
        matches!(self, EngineError::TerminalTransition { .. })
    }
}
