// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job row access. The job manager is the only writer of these rows.

use crate::db::Database;
use crate::error::StorageError;
use quaero_core::{ChildStats, Job, JobId, JobKind, JobStatus};
use sqlx::SqlitePool;

const JOB_COLUMNS: &str = "id, type, job_type, parent_id, status, config, metadata, \
     created_at, started_at, completed_at, last_heartbeat, error_message";

/// Filter for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub parent_id: Option<JobId>,
    pub kind: Option<JobKind>,
    pub job_type: Option<String>,
    pub limit: Option<u32>,
}

/// Outcome of a guarded status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    NotFound,
    /// The row is already terminal; carries the current status.
    AlreadyTerminal(JobStatus),
}

/// Row access for the `jobs` table.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }

    pub async fn insert(&self, job: &Job) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO jobs (id, type, job_type, parent_id, status, config, metadata, \
             created_at, started_at, completed_at, last_heartbeat, error_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(job.id.as_str())
        .bind(&job.job_type)
        .bind(job.kind.to_string())
        .bind(job.parent_id.as_ref().map(|p| p.as_str().to_string()))
        .bind(job.status.to_string())
        .bind(serde_json::to_string(&job.config)?)
        .bind(serde_json::to_string(&job.metadata)?)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.last_heartbeat)
        .bind(job.error_message.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    pub async fn exists(&self, id: &JobId) -> Result<bool, StorageError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM jobs WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Update the mutable fields of a job (config, metadata, heartbeat,
    /// error message). Status changes go through [`Self::update_status`].
    pub async fn update(&self, job: &Job) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE jobs SET config = ?2, metadata = ?3, last_heartbeat = ?4, \
             error_message = ?5 WHERE id = ?1",
        )
        .bind(job.id.as_str())
        .bind(serde_json::to_string(&job.config)?)
        .bind(serde_json::to_string(&job.metadata)?)
        .bind(job.last_heartbeat)
        .bind(job.error_message.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_heartbeat(&self, id: &JobId, at: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE jobs SET last_heartbeat = ?2 WHERE id = ?1")
            .bind(id.as_str())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically apply a status transition, refusing to touch terminal
    /// rows. Stamps `started_at` on the first move to running and
    /// `completed_at` on any move to a terminal status.
    pub async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
        now: i64,
    ) -> Result<StatusUpdate, StorageError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?2, \
             error_message = COALESCE(?3, error_message), \
             started_at = CASE WHEN ?2 = 'running' AND started_at IS NULL THEN ?4 ELSE started_at END, \
             completed_at = CASE WHEN ?2 IN ('completed', 'failed', 'cancelled') THEN ?4 ELSE completed_at END \
             WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(id.as_str())
        .bind(status.to_string())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(StatusUpdate::Applied);
        }

        // Nothing changed: either the row is gone or already terminal.
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match current {
            None => Ok(StatusUpdate::NotFound),
            Some(s) => {
                let parsed = s
                    .parse::<JobStatus>()
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                Ok(StatusUpdate::AlreadyTerminal(parsed))
            }
        }
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StorageError> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE 1 = 1"
        ));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(parent) = &filter.parent_id {
            qb.push(" AND parent_id = ").push_bind(parent.as_str().to_string());
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND job_type = ").push_bind(kind.to_string());
        }
        if let Some(job_type) = &filter.job_type {
            qb.push(" AND type = ").push_bind(job_type.clone());
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<JobRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    pub async fn children(&self, parent: &JobId) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE parent_id = ?1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Aggregate child counts with one GROUP BY query (no N+1).
    pub async fn child_stats(&self, parent: &JobId) -> Result<ChildStats, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM jobs WHERE parent_id = ?1 GROUP BY status",
        )
        .bind(parent.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ChildStats::default();
        for (status, count) in rows {
            let count = count as u64;
            stats.total += count;
            match status.parse::<JobStatus>().map_err(|e| StorageError::Decode(e.to_string()))? {
                JobStatus::Pending => stats.pending += count,
                JobStatus::Running => stats.running += count,
                JobStatus::Completed => stats.completed += count,
                JobStatus::Failed => stats.failed += count,
                JobStatus::Cancelled => stats.cancelled += count,
            }
        }
        Ok(stats)
    }

    /// Parents that have not reached a terminal status yet; scanned by
    /// the orchestrator's backup poll.
    pub async fn active_parents(&self) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE job_type = 'parent' AND status IN ('pending', 'running') \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Delete a job. Child jobs and log rows go with it via FK cascade.
    /// Returns false when the row did not exist.
    pub async fn delete(&self, id: &JobId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    #[sqlx(rename = "type")]
    type_tag: String,
    job_type: String,
    parent_id: Option<String>,
    status: String,
    config: String,
    metadata: String,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    last_heartbeat: Option<i64>,
    error_message: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job, StorageError> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        let kind = self
            .job_type
            .parse::<JobKind>()
            .map_err(|e| StorageError::Decode(e.to_string()))?;

        Ok(Job {
            id: JobId::from_string(self.id),
            job_type: self.type_tag,
            kind,
            parent_id: self.parent_id.map(JobId::from_string),
            status,
            config: serde_json::from_str(&self.config)?,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_heartbeat: self.last_heartbeat,
            error_message: self.error_message,
        })
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
