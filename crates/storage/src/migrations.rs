// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Numbered schema migrations, applied in order on startup.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_migrations`. Migrations also clean up rows orphaned by
//! defunct features so operators never have to repair the file by hand.

/// `(version, sql)` pairs, ascending. Append only — never edit a shipped
/// migration.
pub(crate) const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            job_type TEXT NOT NULL,
            parent_id TEXT REFERENCES jobs(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            config TEXT NOT NULL DEFAULT 'null',
            metadata TEXT NOT NULL DEFAULT 'null',
            created_at INTEGER NOT NULL,
            started_at INTEGER,
            completed_at INTEGER,
            last_heartbeat INTEGER,
            error_message TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_parent ON jobs(parent_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_status_type ON jobs(status, type);",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS job_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            timestamp INTEGER NOT NULL,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            correlation_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_job_logs_job_time
            ON job_logs(job_id, timestamp DESC);",
    ),
    (
        3,
        "CREATE TABLE IF NOT EXISTS job_definitions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            toml TEXT NOT NULL,
            schedule TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            auto_start INTEGER NOT NULL DEFAULT 0,
            validation_status TEXT NOT NULL DEFAULT 'unknown',
            validation_error TEXT,
            validated_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    ),
    (
        4,
        "CREATE TABLE IF NOT EXISTS queue_messages (
            id TEXT PRIMARY KEY,
            queue_name TEXT NOT NULL,
            body TEXT NOT NULL,
            visibility_deadline INTEGER NOT NULL,
            receive_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_queue_visibility
            ON queue_messages(queue_name, visibility_deadline, created_at);",
    ),
    (
        5,
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT,
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            crawl_job_id TEXT,
            fetched_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_crawl_job
            ON documents(crawl_job_id);",
    ),
    (
        // Early builds wrote log rows without FK enforcement; sweep any
        // leftovers so the cascade invariant holds for old files too.
        6,
        "DELETE FROM job_logs WHERE job_id NOT IN (SELECT id FROM jobs);",
    ),
];
