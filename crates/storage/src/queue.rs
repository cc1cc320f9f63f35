// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent queue message rows.
//!
//! A message is in exactly one of three states, derived from its columns:
//! available (`visibility_deadline <= now`), in-flight (deadline in the
//! future after at least one receive), or delayed (future deadline,
//! never received). Claiming extends the deadline and bumps
//! `receive_count` in a single atomic statement, so two pollers can
//! never claim the same message.

use crate::db::Database;
use crate::error::StorageError;
use quaero_core::MessageId;
use sqlx::SqlitePool;

/// A message handed to a worker by [`QueueStore::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedMessage {
    pub message_id: MessageId,
    pub body: String,
    /// Receive count after this claim (first delivery is 1).
    pub receive_count: u32,
}

/// Point-in-time queue depth counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub available: u64,
    pub in_flight: u64,
    pub delayed: u64,
}

/// Row access for the `queue_messages` table.
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
}

impl QueueStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }

    pub async fn enqueue(
        &self,
        queue_name: &str,
        id: &MessageId,
        body: &str,
        visibility_deadline: i64,
        created_at: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO queue_messages (id, queue_name, body, visibility_deadline, receive_count, created_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        )
        .bind(id.as_str())
        .bind(queue_name)
        .bind(body)
        .bind(visibility_deadline)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Claim the oldest available message, moving its deadline to
    /// `new_deadline` and incrementing its receive count.
    pub async fn claim(
        &self,
        queue_name: &str,
        now: i64,
        new_deadline: i64,
    ) -> Result<Option<ClaimedMessage>, StorageError> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "UPDATE queue_messages \
             SET visibility_deadline = ?3, receive_count = receive_count + 1 \
             WHERE id = ( \
                 SELECT id FROM queue_messages \
                 WHERE queue_name = ?1 AND visibility_deadline <= ?2 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
             ) \
             RETURNING id, body, receive_count",
        )
        .bind(queue_name)
        .bind(now)
        .bind(new_deadline)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, body, receive_count)| ClaimedMessage {
            message_id: MessageId::from_string(id),
            body,
            receive_count: receive_count as u32,
        }))
    }

    /// Remove a message. Deleting a missing row is not an error.
    pub async fn delete(&self, id: &MessageId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM queue_messages WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self, queue_name: &str, now: i64) -> Result<QueueStats, StorageError> {
        let (available, in_flight, delayed): (i64, i64, i64) = sqlx::query_as(
            "SELECT \
               COALESCE(SUM(CASE WHEN visibility_deadline <= ?2 THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN visibility_deadline > ?2 AND receive_count > 0 THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN visibility_deadline > ?2 AND receive_count = 0 THEN 1 ELSE 0 END), 0) \
             FROM queue_messages WHERE queue_name = ?1",
        )
        .bind(queue_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            available: available as u64,
            in_flight: in_flight as u64,
            delayed: delayed as u64,
        })
    }

    /// Total rows in the queue regardless of state.
    pub async fn depth(&self, queue_name: &str) -> Result<u64, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE queue_name = ?1")
                .bind(queue_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
