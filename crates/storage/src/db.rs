// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle: pool setup, migrations, maintenance operations.

use crate::error::StorageError;
use crate::migrations::MIGRATIONS;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Connection configuration for the embedded store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// How long a connection waits on a locked database before surfacing
    /// SQLITE_BUSY to the retry wrapper.
    pub busy_timeout_ms: u64,
    pub wal_mode: bool,
    /// Development convenience: wipe the file before opening.
    pub reset_on_startup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quaero.db"),
            busy_timeout_ms: 10_000,
            wal_mode: true,
            reset_on_startup: false,
        }
    }
}

/// Maintenance operation performed by the database-maintenance executor.
/// Exactly one operation runs per queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOp {
    Vacuum,
    Analyze,
    Reindex,
    Optimize,
}

quaero_core::simple_display! {
    MaintenanceOp {
        Vacuum => "vacuum",
        Analyze => "analyze",
        Reindex => "reindex",
        Optimize => "optimize",
    }
}

impl FromStr for MaintenanceOp {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vacuum" => Ok(MaintenanceOp::Vacuum),
            "analyze" => Ok(MaintenanceOp::Analyze),
            "reindex" => Ok(MaintenanceOp::Reindex),
            "optimize" => Ok(MaintenanceOp::Optimize),
            other => Err(StorageError::UnknownMaintenanceOp(other.to_string())),
        }
    }
}

/// Shared handle to the embedded store.
///
/// Cloning is cheap; all stores share one pool. SQLite in WAL mode lets
/// readers run concurrently while writers serialise on the file.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and create if missing) the database file described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        if config.reset_on_startup && config.path.exists() {
            tracing::warn!(path = %config.path.display(), "reset_on_startup: removing database file");
            let _ = std::fs::remove_file(&config.path);
            let _ = std::fs::remove_file(config.path.with_extension("db-wal"));
            let _ = std::fs::remove_file(config.path.with_extension("db-shm"));
        }

        let journal_mode = if config.wal_mode {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(journal_mode)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. Single connection — every handle
    /// must observe the same memory database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply all pending numbered migrations.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
            .fetch_all(&self.pool)
            .await?;

        for (version, sql) in MIGRATIONS {
            if applied.contains(version) {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| StorageError::Migration { version: *version, source })?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await
                .map_err(|source| StorageError::Migration { version: *version, source })?;
            tx.commit().await?;

            tracing::info!(version, "applied migration");
        }

        Ok(())
    }

    /// Run one maintenance operation.
    pub async fn run_maintenance(&self, op: MaintenanceOp) -> Result<(), StorageError> {
        let sql = match op {
            MaintenanceOp::Vacuum => "VACUUM",
            MaintenanceOp::Analyze => "ANALYZE",
            MaintenanceOp::Reindex => "REINDEX",
            MaintenanceOp::Optimize => "PRAGMA optimize",
        };
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
