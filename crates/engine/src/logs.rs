// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffered per-job log service.
//!
//! Appends land in a bounded in-memory buffer and reach the store in
//! batches — at 100 entries or after one second, whichever comes first.
//! Each append is also fanned out live as a `log_event`. Log failures
//! never propagate into the flows that produced them.

use crate::bus::EventBus;
use crate::error::EngineError;
use parking_lot::{Mutex, RwLock};
use quaero_core::{format_clock_time, Event, JobId, JobLogEntry};
use quaero_storage::{JobStore, LogStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Flush when the buffer reaches this many entries.
pub const FLUSH_BATCH: usize = 100;
/// Flush at least this often.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Result of an aggregated log read.
#[derive(Debug, Clone)]
pub struct AggregatedLogs {
    pub entries: Vec<JobLogEntry>,
    /// Parent job metadata; empty object when extraction failed.
    pub metadata: serde_json::Value,
    pub correlation_id: String,
}

struct LogServiceInner {
    store: LogStore,
    jobs: JobStore,
    bus: RwLock<Option<EventBus>>,
    buffer: Mutex<Vec<JobLogEntry>>,
    flush_notify: Notify,
}

/// Cheaply cloneable handle to the log service.
#[derive(Clone)]
pub struct LogService {
    inner: Arc<LogServiceInner>,
}

impl LogService {
    pub fn new(store: LogStore, jobs: JobStore) -> Self {
        Self {
            inner: Arc::new(LogServiceInner {
                store,
                jobs,
                bus: RwLock::new(None),
                buffer: Mutex::new(Vec::new()),
                flush_notify: Notify::new(),
            }),
        }
    }

    /// Attach the event bus after construction. Optional — without a bus
    /// the service persists entries but skips the live feed.
    pub fn attach_bus(&self, bus: EventBus) {
        *self.inner.bus.write() = Some(bus);
    }

    /// Spawn the background flusher. Runs until `cancel` fires, then
    /// drains whatever is buffered.
    pub fn spawn_flusher(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        service.flush().await;
                        break;
                    }
                    _ = service.inner.flush_notify.notified() => {
                        service.flush().await;
                    }
                    _ = tokio::time::sleep(FLUSH_INTERVAL) => {
                        service.flush().await;
                    }
                }
            }
        })
    }

    /// Buffer one entry and feed it to live subscribers.
    pub fn append(&self, entry: JobLogEntry) {
        if let Some(bus) = self.inner.bus.read().as_ref() {
            bus.publish(Event::LogEvent {
                job_id: entry.job_id.clone(),
                timestamp: format_clock_time(entry.timestamp_ms),
                level: entry.level,
                message: entry.message.clone(),
                correlation_id: entry.correlation_id.clone(),
            });
        }

        let should_flush = {
            let mut buffer = self.inner.buffer.lock();
            buffer.push(entry);
            buffer.len() >= FLUSH_BATCH
        };
        if should_flush {
            self.inner.flush_notify.notify_one();
        }
    }

    /// Write everything buffered. Failures are logged and swallowed —
    /// losing a log line must not fail the operation that produced it.
    pub async fn flush(&self) {
        let batch: Vec<JobLogEntry> = {
            let mut buffer = self.inner.buffer.lock();
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.inner.store.append_batch(&batch).await {
            tracing::warn!(dropped = batch.len(), error = %e, "failed to flush job logs");
        }
    }

    /// Entries for one job, newest first.
    pub async fn get_logs(
        &self,
        job_id: &JobId,
        limit: u32,
    ) -> Result<Vec<JobLogEntry>, EngineError> {
        self.flush().await;
        Ok(self.inner.store.list(job_id, limit).await?)
    }

    /// The parent's entries plus all descendant entries merged in
    /// timestamp order. Fails with `JobNotFound` when the parent row
    /// does not exist; metadata extraction is best-effort.
    pub async fn get_logs_aggregated(
        &self,
        job_id: &JobId,
        limit: u32,
    ) -> Result<AggregatedLogs, EngineError> {
        if !self.inner.jobs.exists(job_id).await? {
            return Err(EngineError::JobNotFound(job_id.clone()));
        }

        self.flush().await;
        let entries = self.inner.store.list_aggregated(job_id, limit).await?;

        let metadata = match self.inner.jobs.get(job_id).await {
            Ok(Some(job)) if job.metadata.is_object() => job.metadata,
            Ok(_) => serde_json::json!({}),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "metadata extraction failed; returning logs without it");
                serde_json::json!({})
            }
        };

        Ok(AggregatedLogs {
            entries,
            metadata,
            correlation_id: format!("corr-{}", nanoid::nanoid!(10)),
        })
    }

    /// Buffered entry count, for tests and introspection.
    pub fn buffered(&self) -> usize {
        self.inner.buffer.lock().len()
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
