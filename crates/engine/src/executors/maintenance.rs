// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database maintenance executor: exactly one store operation per
//! message (vacuum, analyze, reindex, or optimize).

use crate::error::EngineError;
use crate::manager::JobManager;
use crate::registry::{ExecutionContext, JobExecutor};
use async_trait::async_trait;
use quaero_core::{JobMessage, JobStatus, LogLevel};
use quaero_storage::{Database, MaintenanceOp};
use std::sync::Arc;

pub const WORKER_TYPE: &str = "database_maintenance_operation";

pub struct MaintenanceExecutor {
    manager: Arc<JobManager>,
    database: Database,
}

impl MaintenanceExecutor {
    pub fn new(manager: Arc<JobManager>, database: Database) -> Self {
        Self { manager, database }
    }

    fn operation(message: &JobMessage) -> Result<MaintenanceOp, EngineError> {
        let op = message
            .config
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::Validation("maintenance message has no operation".into()))?;
        op.parse::<MaintenanceOp>()
            .map_err(|e| EngineError::Validation(e.to_string()))
    }
}

#[async_trait]
impl JobExecutor for MaintenanceExecutor {
    fn worker_type(&self) -> &str {
        WORKER_TYPE
    }

    fn validate(&self, message: &JobMessage) -> Result<(), EngineError> {
        Self::operation(message).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError> {
        let op = Self::operation(message)?;
        if ctx.is_cancelled() {
            return Err(EngineError::Executor("cancelled before maintenance".into()));
        }

        self.database
            .run_maintenance(op)
            .await
            .map_err(|e| EngineError::Executor(format!("{op} failed: {e}")))?;

        self.manager
            .add_job_log(&message.job_id, LogLevel::Info, format!("Maintenance complete: {op}"))
            .await;

        match self.manager.update_job_status(&message.job_id, JobStatus::Completed, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
