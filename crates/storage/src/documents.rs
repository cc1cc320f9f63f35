// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crawled and generated documents.
//!
//! Minimal persistence target for the crawler and summarizer executors.
//! Full-text indexing lives outside the orchestration core.

use crate::db::Database;
use crate::error::StorageError;
use quaero_core::JobId;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// One stored document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub body: String,
    pub content_hash: String,
    pub crawl_job_id: Option<JobId>,
    pub fetched_at: i64,
}

impl Document {
    /// Build a document keyed by its URL. The id is derived from the URL
    /// so re-crawling the same page upserts instead of duplicating.
    pub fn from_fetch(
        url: impl Into<String>,
        title: Option<String>,
        body: impl Into<String>,
        crawl_job_id: Option<JobId>,
        fetched_at: i64,
    ) -> Self {
        let url = url.into();
        let body = body.into();
        let id = format!("doc-{}", &hex_digest(url.as_bytes())[..16]);
        let content_hash = hex_digest(body.as_bytes());
        Self { id, url, title, body, content_hash, crawl_job_id, fetched_at }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Row access for the `documents` table.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }

    /// Insert or replace by URL.
    pub async fn upsert(&self, doc: &Document) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO documents (id, url, title, body, content_hash, crawl_job_id, fetched_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(url) DO UPDATE SET \
                 title = excluded.title, \
                 body = excluded.body, \
                 content_hash = excluded.content_hash, \
                 crawl_job_id = excluded.crawl_job_id, \
                 fetched_at = excluded.fetched_at",
        )
        .bind(&doc.id)
        .bind(&doc.url)
        .bind(doc.title.as_deref())
        .bind(&doc.body)
        .bind(&doc.content_hash)
        .bind(doc.crawl_job_id.as_ref().map(|j| j.as_str().to_string()))
        .bind(doc.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query_as::<_, DocRow>(
            "SELECT id, url, title, body, content_hash, crawl_job_id, fetched_at \
             FROM documents WHERE url = ?1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DocRow::into_document))
    }

    /// Documents produced under one crawl job (the parent of the crawl).
    pub async fn list_for_job(
        &self,
        crawl_job_id: &JobId,
        limit: u32,
    ) -> Result<Vec<Document>, StorageError> {
        let rows = sqlx::query_as::<_, DocRow>(
            "SELECT id, url, title, body, content_hash, crawl_job_id, fetched_at \
             FROM documents WHERE crawl_job_id = ?1 \
             ORDER BY fetched_at ASC, id ASC LIMIT ?2",
        )
        .bind(crawl_job_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DocRow::into_document).collect())
    }

    pub async fn count_for_job(&self, crawl_job_id: &JobId) -> Result<u64, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE crawl_job_id = ?1")
                .bind(crawl_job_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocRow {
    id: String,
    url: String,
    title: Option<String>,
    body: String,
    content_hash: String,
    crawl_job_id: Option<String>,
    fetched_at: i64,
}

impl DocRow {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            url: self.url,
            title: self.title,
            body: self.body,
            content_hash: self.content_hash,
            crawl_job_id: self.crawl_job_id.map(JobId::from_string),
            fetched_at: self.fetched_at,
        }
    }
}

#[cfg(test)]
#[path = "documents_tests.rs"]
mod tests;
