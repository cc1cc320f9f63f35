// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent queue service: at-least-once delivery with visibility
//! timeouts and dead-lettering.

use crate::bus::EventBus;
use crate::error::EngineError;
use parking_lot::RwLock;
use quaero_core::{Clock, Event, JobMessage, MessageId};
use quaero_storage::{QueueStats, QueueStore};
use std::sync::Arc;
use std::time::Duration;

/// Queue pool configuration (`[queue]` section).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_name: String,
    /// Worker count.
    pub concurrency: u32,
    pub poll_interval: Duration,
    /// How long a received message stays hidden before redelivery.
    pub visibility_timeout: Duration,
    /// Receive attempts before a message is dead-lettered.
    pub max_receive: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: "quaero_jobs".to_string(),
            concurrency: 2,
            poll_interval: Duration::from_secs(1),
            visibility_timeout: Duration::from_secs(60),
            max_receive: 3,
        }
    }
}

/// A message claimed by [`QueueService::receive`].
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub message: JobMessage,
    pub receive_count: u32,
}

/// Durable at-least-once message delivery within the process.
pub struct QueueService {
    store: QueueStore,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    bus: RwLock<Option<EventBus>>,
}

impl QueueService {
    pub fn new(store: QueueStore, clock: Arc<dyn Clock>, config: QueueConfig) -> Self {
        Self { store, clock, config, bus: RwLock::new(None) }
    }

    pub fn attach_bus(&self, bus: EventBus) {
        *self.bus.write() = Some(bus);
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a message, immediately visible.
    pub async fn enqueue(&self, message: &JobMessage) -> Result<MessageId, EngineError> {
        self.enqueue_delayed(message, Duration::ZERO).await
    }

    /// Enqueue a message that becomes visible after `delay`.
    pub async fn enqueue_delayed(
        &self,
        message: &JobMessage,
        delay: Duration,
    ) -> Result<MessageId, EngineError> {
        let id = MessageId::new();
        let body = message.encode()?;
        let now = self.clock.epoch_secs();
        self.store
            .enqueue(
                &self.config.queue_name,
                &id,
                &body,
                now + delay.as_secs() as i64,
                now,
            )
            .await?;
        tracing::debug!(message_id = %id, job_id = %message.job_id, "enqueued message");
        Ok(id)
    }

    /// Claim one available message, extending its visibility deadline
    /// and bumping its receive count.
    ///
    /// Messages past `max_receive` are dead-lettered here: deleted,
    /// logged, and announced with a `dead_letter` event; the caller sees
    /// `None` and keeps polling.
    pub async fn receive(&self) -> Result<Option<ReceivedMessage>, EngineError> {
        let now = self.clock.epoch_secs();
        let deadline = now + self.config.visibility_timeout.as_secs() as i64;

        let claimed = match self.store.claim(&self.config.queue_name, now, deadline).await? {
            Some(claimed) => claimed,
            None => return Ok(None),
        };

        let message = match JobMessage::decode(&claimed.body) {
            Ok(message) => message,
            Err(e) => {
                // Undecodable bodies can never succeed; drop them now.
                tracing::error!(message_id = %claimed.message_id, error = %e, "dropping undecodable queue message");
                self.store.delete(&claimed.message_id).await?;
                return Ok(None);
            }
        };

        if claimed.receive_count > self.config.max_receive {
            self.dead_letter(&claimed.message_id, &message, claimed.receive_count).await?;
            return Ok(None);
        }

        Ok(Some(ReceivedMessage {
            message_id: claimed.message_id,
            message,
            receive_count: claimed.receive_count,
        }))
    }

    async fn dead_letter(
        &self,
        message_id: &MessageId,
        message: &JobMessage,
        receive_count: u32,
    ) -> Result<(), EngineError> {
        tracing::warn!(
            message_id = %message_id,
            job_id = %message.job_id,
            job_type = %message.job_type,
            receive_count,
            max_receive = self.config.max_receive,
            "dead-lettering message after exhausted redeliveries"
        );
        self.store.delete(message_id).await?;

        if let Some(bus) = self.bus.read().as_ref() {
            bus.publish(Event::DeadLetter {
                message_id: message_id.clone(),
                queue_name: self.config.queue_name.clone(),
                job_id: message.job_id.clone(),
                receive_count,
            });
        }
        Ok(())
    }

    /// Remove a message after successful processing. Idempotent.
    pub async fn delete(&self, id: &MessageId) -> Result<(), EngineError> {
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<QueueStats, EngineError> {
        Ok(self.store.stats(&self.config.queue_name, self.clock.epoch_secs()).await?)
    }

    /// Total messages still in the queue table.
    pub async fn depth(&self) -> Result<u64, EngineError> {
        Ok(self.store.depth(&self.config.queue_name).await?)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
