// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job log rows. Writes arrive in batches from the log service.

use crate::db::Database;
use crate::error::StorageError;
use quaero_core::{JobId, JobLogEntry, LogLevel};
use sqlx::SqlitePool;

/// Row access for the `job_logs` table.
#[derive(Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }

    /// Insert a batch of entries in one transaction.
    pub async fn append_batch(&self, entries: &[JobLogEntry]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO job_logs (job_id, timestamp, level, message, correlation_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(entry.job_id.as_str())
            .bind(entry.timestamp_ms)
            .bind(entry.level.to_string())
            .bind(&entry.message)
            .bind(entry.correlation_id.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Entries for one job, newest first.
    pub async fn list(&self, job_id: &JobId, limit: u32) -> Result<Vec<JobLogEntry>, StorageError> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT job_id, timestamp, level, message, correlation_id \
             FROM job_logs WHERE job_id = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )
        .bind(job_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    /// Entries for `root` and every descendant job, merged in timestamp
    /// order (oldest first).
    pub async fn list_aggregated(
        &self,
        root: &JobId,
        limit: u32,
    ) -> Result<Vec<JobLogEntry>, StorageError> {
        let rows = sqlx::query_as::<_, LogRow>(
            "WITH RECURSIVE tree(id) AS ( \
                 SELECT id FROM jobs WHERE id = ?1 \
                 UNION ALL \
                 SELECT j.id FROM jobs j JOIN tree t ON j.parent_id = t.id \
             ) \
             SELECT l.job_id, l.timestamp, l.level, l.message, l.correlation_id \
             FROM job_logs l JOIN tree ON l.job_id = tree.id \
             ORDER BY l.timestamp ASC, l.id ASC LIMIT ?2",
        )
        .bind(root.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    pub async fn count(&self, job_id: &JobId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_logs WHERE job_id = ?1")
            .bind(job_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    job_id: String,
    timestamp: i64,
    level: String,
    message: String,
    correlation_id: Option<String>,
}

impl LogRow {
    fn into_entry(self) -> Result<JobLogEntry, StorageError> {
        let level = self
            .level
            .parse::<LogLevel>()
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(JobLogEntry {
            job_id: JobId::from_string(self.job_id),
            timestamp_ms: self.timestamp,
            level,
            message: self.message,
            correlation_id: self.correlation_id,
        })
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
