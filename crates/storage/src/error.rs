// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error type and busy-signal detection.

use thiserror::Error;

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid row data: {0}")]
    Decode(String),

    #[error("unknown maintenance operation: {0}")]
    UnknownMaintenanceOp(String),
}

impl StorageError {
    /// True when the underlying store reported write contention
    /// (SQLITE_BUSY / "database is locked"). Only these errors are
    /// worth retrying; everything else propagates immediately.
    pub fn is_busy(&self) -> bool {
        match self {
            StorageError::Sqlx(sqlx::Error::Database(db_err)) => {
                if db_err.message().contains("database is locked")
                    || db_err.message().contains("database table is locked")
                {
                    return true;
                }
                // SQLITE_BUSY primary result code
                db_err.code().as_deref() == Some("5")
            }
            _ => false,
        }
    }
}
