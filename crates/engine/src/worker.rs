// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool: staggered pollers draining the persistent queue into
//! typed executors.
//!
//! Workers phase-shift their first poll by `poll_interval / n * i` so
//! they do not hammer the single-writer store in lockstep. Messages are
//! only deleted after a successful execution (or when provably
//! unprocessable); everything else rides the visibility timeout back
//! into the queue.

use crate::error::EngineError;
use crate::manager::JobManager;
use crate::queue::{QueueService, ReceivedMessage};
use crate::registry::{ExecutionContext, ExecutorRegistry};
use parking_lot::Mutex;
use quaero_core::{JobStatus, LogLevel, MessageId};
use quaero_storage::{retry_on_busy, QUEUE_DELETE_ATTEMPTS, QUEUE_DELETE_DELAY};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pool of queue pollers.
pub struct WorkerPool {
    queue: Arc<QueueService>,
    manager: Arc<JobManager>,
    registry: Arc<ExecutorRegistry>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<QueueService>,
        manager: Arc<JobManager>,
        registry: Arc<ExecutorRegistry>,
    ) -> Self {
        Self {
            queue,
            manager,
            registry,
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Launch the configured number of pollers.
    pub fn start(self: Arc<Self>) {
        let concurrency = self.queue.config().concurrency.max(1);
        let mut handles = Vec::with_capacity(concurrency as usize);
        for index in 0..concurrency {
            let pool = Arc::clone(&self);
            handles.push(tokio::spawn(async move { pool.run_worker(index, concurrency).await }));
        }
        self.handles.lock().extend(handles);
        tracing::info!(concurrency, "worker pool started");
    }

    /// Cancel the shared context and wait for pollers to drain, up to
    /// `deadline`. In-flight messages are not deleted; they come back
    /// after the visibility timeout.
    pub async fn stop(&self, deadline: Duration) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(deadline, join_all).await.is_err() {
            tracing::warn!("worker pool stop deadline elapsed before drain");
        }
    }

    async fn run_worker(&self, index: u32, concurrency: u32) {
        let poll_interval = self.queue.config().poll_interval;

        // Staggered startup: worker i waits (interval / n) * i before
        // its first poll to phase-shift store contention.
        let stagger = poll_interval.mul_f64(index as f64 / concurrency as f64);
        if !stagger.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(stagger) => {}
            }
        }

        tracing::debug!(worker = index, "poller started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.queue.receive().await {
                Ok(Some(received)) => {
                    self.process(index, received).await;
                    // Drain eagerly while messages are available.
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(worker = index, error = %e, "queue receive failed");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        tracing::debug!(worker = index, "poller stopped");
    }

    async fn process(&self, index: u32, received: ReceivedMessage) {
        let ReceivedMessage { message_id, message, receive_count } = received;
        let job_id = message.job_id.clone();

        let Some(executor) = self.registry.get(&message.job_type) else {
            tracing::error!(
                worker = index,
                job_id = %job_id,
                job_type = %message.job_type,
                "no executor for message type; deleting"
            );
            self.delete_with_retry(&message_id).await;
            return;
        };

        if let Err(e) = executor.validate(&message) {
            tracing::warn!(worker = index, job_id = %job_id, error = %e, "message failed validation");
            self.mark_failed(&job_id, &format!("validation failed: {e}")).await;
            self.delete_with_retry(&message_id).await;
            return;
        }

        // Dispatch: pending → running. A terminal job here means the
        // work was cancelled (or finished) while the message waited;
        // absorb the duplicate by dropping the message.
        match self.manager.update_job_status(&job_id, JobStatus::Running, None).await {
            Ok(()) => {}
            Err(e) if e.is_terminal_transition() => {
                tracing::debug!(worker = index, job_id = %job_id, "job already terminal; dropping message");
                self.delete_with_retry(&message_id).await;
                return;
            }
            Err(EngineError::JobNotFound(_)) => {
                tracing::warn!(worker = index, job_id = %job_id, "job row missing; dropping message");
                self.delete_with_retry(&message_id).await;
                return;
            }
            Err(e) => {
                // Transient store trouble: leave the message for redelivery.
                tracing::warn!(worker = index, job_id = %job_id, error = %e, "failed to mark job running");
                return;
            }
        }

        let ctx = ExecutionContext::new(self.cancel.child_token());
        match executor.execute(&ctx, &message).await {
            Ok(()) => {
                self.delete_with_retry(&message_id).await;
            }
            Err(e) => {
                tracing::error!(
                    worker = index,
                    job_id = %job_id,
                    receive_count,
                    error = %e,
                    "executor failed; message left for redelivery"
                );
                self.manager
                    .add_job_log(&job_id, LogLevel::Error, format!("Execution attempt failed: {e}"))
                    .await;
                // No delete: the visibility timeout re-delivers, and the
                // queue dead-letters once receive_count passes the limit.
            }
        }
    }

    async fn mark_failed(&self, job_id: &quaero_core::JobId, reason: &str) {
        match self.manager.update_job_status(job_id, JobStatus::Failed, Some(reason)).await {
            Ok(()) => {}
            Err(e) if e.is_terminal_transition() => {}
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "failed to mark job failed"),
        }
    }

    async fn delete_with_retry(&self, message_id: &MessageId) {
        let result = retry_on_busy(
            || async { self.queue.delete(message_id).await },
            QUEUE_DELETE_ATTEMPTS,
            QUEUE_DELETE_DELAY,
        )
        .await;
        if let Err(e) = result {
            // The message will be redelivered and dropped again later.
            tracing::warn!(message_id = %message_id, error = %e, "failed to delete message");
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
