// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor registry: string job types mapped to typed executors.

use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::RwLock;
use quaero_core::JobMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-invocation context handed to executors.
///
/// Executors receive their collaborators (manager, queue, stores) at
/// construction; the context only carries what varies per call.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Fires on shutdown. Executors observe it at checkpoints and bail
    /// out; their message is redelivered after the visibility timeout.
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A typed message handler.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// The job type this executor handles (registry key).
    fn worker_type(&self) -> &str;

    /// Cheap precondition check before execution. A failure marks the
    /// job failed and drops the message.
    fn validate(&self, message: &JobMessage) -> Result<(), EngineError>;

    /// Process one message. Errors leave the message in the queue for
    /// redelivery; success lets the dispatcher delete it.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError>;
}

/// Open registry of executors, keyed by worker type. Registration may
/// happen any time before (or after) the worker pool starts.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn JobExecutor>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own worker type. A second
    /// registration for the same type replaces the first.
    pub fn register(&self, executor: Arc<dyn JobExecutor>) {
        let key = executor.worker_type().to_string();
        let replaced = self.executors.write().insert(key.clone(), executor).is_some();
        if replaced {
            tracing::warn!(worker_type = %key, "replaced existing executor registration");
        } else {
            tracing::info!(worker_type = %key, "registered executor");
        }
    }

    pub fn get(&self, worker_type: &str) -> Option<Arc<dyn JobExecutor>> {
        self.executors.read().get(worker_type).cloned()
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.read().keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
