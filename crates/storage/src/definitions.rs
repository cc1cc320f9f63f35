// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definition rows. The TOML document is stored verbatim; a few
//! fields are denormalised into columns for the scheduler's query.

use crate::db::Database;
use crate::error::StorageError;
use quaero_core::DefinitionId;
use sqlx::SqlitePool;

/// One stored job definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRow {
    pub id: DefinitionId,
    pub name: String,
    pub def_type: String,
    pub toml: String,
    pub schedule: Option<String>,
    pub enabled: bool,
    pub auto_start: bool,
    pub validation_status: String,
    pub validation_error: Option<String>,
    pub validated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row access for the `job_definitions` table.
#[derive(Clone)]
pub struct DefinitionStore {
    pool: SqlitePool,
}

impl DefinitionStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }

    /// Insert or update by id. `created_at` of an existing row survives.
    pub async fn upsert(&self, row: &DefinitionRow) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO job_definitions \
             (id, name, type, toml, schedule, enabled, auto_start, \
              validation_status, validation_error, validated_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(id) DO UPDATE SET \
                 name = excluded.name, \
                 type = excluded.type, \
                 toml = excluded.toml, \
                 schedule = excluded.schedule, \
                 enabled = excluded.enabled, \
                 auto_start = excluded.auto_start, \
                 validation_status = excluded.validation_status, \
                 validation_error = excluded.validation_error, \
                 validated_at = excluded.validated_at, \
                 updated_at = excluded.updated_at",
        )
        .bind(row.id.as_str())
        .bind(&row.name)
        .bind(&row.def_type)
        .bind(&row.toml)
        .bind(row.schedule.as_deref())
        .bind(row.enabled)
        .bind(row.auto_start)
        .bind(&row.validation_status)
        .bind(row.validation_error.as_deref())
        .bind(row.validated_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &DefinitionId) -> Result<Option<DefinitionRow>, StorageError> {
        let row = sqlx::query_as::<_, DefRow>(
            "SELECT id, name, type, toml, schedule, enabled, auto_start, \
             validation_status, validation_error, validated_at, created_at, updated_at \
             FROM job_definitions WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DefRow::into_row))
    }

    pub async fn list(&self) -> Result<Vec<DefinitionRow>, StorageError> {
        let rows = sqlx::query_as::<_, DefRow>(
            "SELECT id, name, type, toml, schedule, enabled, auto_start, \
             validation_status, validation_error, validated_at, created_at, updated_at \
             FROM job_definitions ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DefRow::into_row).collect())
    }

    /// Enabled definitions with a schedule, for the scheduler tick.
    pub async fn list_scheduled(&self) -> Result<Vec<DefinitionRow>, StorageError> {
        let rows = sqlx::query_as::<_, DefRow>(
            "SELECT id, name, type, toml, schedule, enabled, auto_start, \
             validation_status, validation_error, validated_at, created_at, updated_at \
             FROM job_definitions \
             WHERE enabled = 1 AND schedule IS NOT NULL AND validation_status = 'valid' \
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DefRow::into_row).collect())
    }

    pub async fn set_validation(
        &self,
        id: &DefinitionId,
        status: &str,
        error: Option<&str>,
        at: i64,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE job_definitions \
             SET validation_status = ?2, validation_error = ?3, validated_at = ?4, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id.as_str())
        .bind(status)
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: &DefinitionId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM job_definitions WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DefRow {
    id: String,
    name: String,
    #[sqlx(rename = "type")]
    def_type: String,
    toml: String,
    schedule: Option<String>,
    enabled: bool,
    auto_start: bool,
    validation_status: String,
    validation_error: Option<String>,
    validated_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl DefRow {
    fn into_row(self) -> DefinitionRow {
        DefinitionRow {
            id: DefinitionId::from_string(self.id),
            name: self.name,
            def_type: self.def_type,
            toml: self.toml,
            schedule: self.schedule,
            enabled: self.enabled,
            auto_start: self.auto_start,
            validation_status: self.validation_status,
            validation_error: self.validation_error,
            validated_at: self.validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
#[path = "definitions_tests.rs"]
mod tests;
