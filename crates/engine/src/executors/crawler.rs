// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crawler URL executor: fetch one page, store it, expand links into
//! child messages.
//!
//! Each message covers exactly one URL. Link expansion creates one
//! child job per discovered link (up to the depth and page budget), so
//! a crawl is a flat parent with many children rather than a recursive
//! tree of fetches.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::manager::JobManager;
use crate::queue::QueueService;
use crate::registry::{ExecutionContext, JobExecutor};
use async_trait::async_trait;
use parking_lot::Mutex;
use quaero_core::{Clock, Event, Job, JobMessage, JobStatus, LogLevel};
use quaero_storage::{
    retry_on_busy, Document, DocumentStore, CHILD_CREATE_ATTEMPTS, CHILD_CREATE_DELAY,
    JOB_WRITE_ATTEMPTS, JOB_WRITE_DELAY,
};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

pub const WORKER_TYPE: &str = "crawler_url";

fn default_max_depth() -> u32 {
    1
}
fn default_max_pages() -> u64 {
    10
}
fn default_same_domain() -> bool {
    true
}
fn default_rate_limit_ms() -> u64 {
    500
}

/// Per-message crawl configuration, read from the job config bag.
#[derive(Debug, Clone, Deserialize)]
struct CrawlConfig {
    url: Option<String>,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
    #[serde(default = "default_max_pages")]
    max_pages: u64,
    #[serde(default = "default_same_domain")]
    same_domain: bool,
    #[serde(default = "default_rate_limit_ms")]
    rate_limit_ms: u64,
}

impl CrawlConfig {
    fn from_message(message: &JobMessage) -> Result<(Self, Url), EngineError> {
        let mut config: CrawlConfig = if message.config.is_object() {
            serde_json::from_value(message.config.clone())
                .map_err(|e| EngineError::Validation(format!("bad crawler config: {e}")))?
        } else {
            CrawlConfig {
                url: None,
                max_depth: default_max_depth(),
                max_pages: default_max_pages(),
                same_domain: default_same_domain(),
                rate_limit_ms: default_rate_limit_ms(),
            }
        };
        if config.url.is_none() {
            config.url = message.url.clone();
        }

        let raw = config
            .url
            .as_deref()
            .ok_or_else(|| EngineError::Validation("crawler message has no url".into()))?;
        let url = Url::parse(raw)
            .map_err(|e| EngineError::Validation(format!("invalid url '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::Validation(format!(
                "unsupported url scheme '{}'",
                url.scheme()
            )));
        }
        Ok((config, url))
    }
}

/// Fetches pages and expands discovered links, rate-limited per domain.
pub struct CrawlerExecutor {
    manager: Arc<JobManager>,
    queue: Arc<QueueService>,
    documents: DocumentStore,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    last_fetch: Mutex<HashMap<String, Instant>>,
}

impl CrawlerExecutor {
    pub fn new(
        manager: Arc<JobManager>,
        queue: Arc<QueueService>,
        documents: DocumentStore,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("quaero-crawler/0.1")
            .build()
            .unwrap_or_default();
        Self { manager, queue, documents, bus, clock, http, last_fetch: Mutex::new(HashMap::new()) }
    }

    /// Sleep until the per-domain minimum interval has passed, then
    /// claim the slot.
    async fn rate_limit(&self, domain: &str, min_interval: Duration) {
        loop {
            let wait = {
                let mut last = self.last_fetch.lock();
                let now = Instant::now();
                match last.get(domain) {
                    Some(prev) if now.duration_since(*prev) < min_interval => {
                        min_interval - now.duration_since(*prev)
                    }
                    _ => {
                        last.insert(domain.to_string(), now);
                        return;
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    async fn spawn_child(
        &self,
        message: &JobMessage,
        crawl_root: &quaero_core::JobId,
        link: &Url,
        config: &CrawlConfig,
    ) -> Result<(), EngineError> {
        let child = Job::child(WORKER_TYPE, crawl_root.clone(), &self.clock)
            .with_config(serde_json::json!({
                "url": link.as_str(),
                "max_depth": config.max_depth,
                "max_pages": config.max_pages,
                "same_domain": config.same_domain,
                "rate_limit_ms": config.rate_limit_ms,
            }))
            .with_metadata(message.metadata.clone());

        // Hot path during crawl expansion: retry child creation hard.
        retry_on_busy(
            || async { self.manager.create_job(&child).await.map(|_| ()) },
            CHILD_CREATE_ATTEMPTS,
            CHILD_CREATE_DELAY,
        )
        .await?;

        let child_message =
            JobMessage::for_job(&child, self.clock.epoch_secs()).with_depth(message.depth + 1);
        self.queue.enqueue(&child_message).await?;
        Ok(())
    }

    /// Absorb a completion that raced with cancellation.
    async fn finish(&self, message: &JobMessage) -> Result<(), EngineError> {
        match self.manager.update_job_status(&message.job_id, JobStatus::Completed, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl JobExecutor for CrawlerExecutor {
    fn worker_type(&self) -> &str {
        WORKER_TYPE
    }

    fn validate(&self, message: &JobMessage) -> Result<(), EngineError> {
        CrawlConfig::from_message(message).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError> {
        let (config, url) = CrawlConfig::from_message(message)?;
        let job_id = &message.job_id;
        let crawl_root = message.parent_id.clone().unwrap_or_else(|| job_id.clone());

        // Budget check before spending a fetch on this message.
        let fetched = self.documents.count_for_job(&crawl_root).await?;
        if fetched >= config.max_pages {
            self.manager
                .add_job_log(job_id, LogLevel::Info, "Page budget exhausted; skipping fetch")
                .await;
            return self.finish(message).await;
        }

        if ctx.is_cancelled() {
            return Err(EngineError::Executor("cancelled before fetch".into()));
        }

        let domain = url.host_str().unwrap_or("").to_string();
        self.rate_limit(&domain, Duration::from_millis(config.rate_limit_ms)).await;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| EngineError::Executor(format!("fetch {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(EngineError::Executor(format!(
                "fetch {url} returned status {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Executor(format!("read body of {url} failed: {e}")))?;

        let title = extract_title(&body);
        let document = Document::from_fetch(
            url.as_str(),
            title,
            &body,
            Some(crawl_root.clone()),
            self.clock.epoch_secs(),
        );
        retry_on_busy(
            || async { self.documents.upsert(&document).await.map_err(EngineError::from) },
            JOB_WRITE_ATTEMPTS,
            JOB_WRITE_DELAY,
        )
        .await?;
        self.manager.touch_heartbeat(job_id).await;

        let pages_fetched = self.documents.count_for_job(&crawl_root).await?;
        self.bus.publish(Event::CrawlProgress {
            job_id: job_id.clone(),
            url: url.to_string(),
            depth: message.depth,
            pages_fetched,
            page_budget: config.max_pages,
        });
        self.manager
            .add_job_log(
                job_id,
                LogLevel::Info,
                format!("Fetched {url} ({pages_fetched}/{} pages)", config.max_pages),
            )
            .await;

        if message.depth < config.max_depth && pages_fetched < config.max_pages {
            let links = extract_links(&body, &url, config.same_domain);
            let budget = (config.max_pages - pages_fetched) as usize;
            for link in links.into_iter().take(budget) {
                if ctx.is_cancelled() {
                    return Err(EngineError::Executor("cancelled during expansion".into()));
                }
                if self.documents.get_by_url(link.as_str()).await?.is_some() {
                    continue;
                }
                self.spawn_child(message, &crawl_root, &link, &config).await?;
            }
        }

        self.finish(message).await
    }
}

/// Pull the `<title>` text out of a page, if any.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?;
    let text: String = title.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extract unique http(s) links from a page, resolved against `base`.
/// Fragments are stripped so `#section` anchors do not fan out into
/// duplicate fetches.
pub fn extract_links(html: &str, base: &Url, same_domain: bool) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else { continue };
        let Ok(mut resolved) = base.join(href) else { continue };
        resolved.set_fragment(None);

        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if same_domain && resolved.host_str() != base.host_str() {
            continue;
        }
        if resolved == *base {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }
    links
}

#[cfg(test)]
#[path = "crawler_tests.rs"]
mod tests;
