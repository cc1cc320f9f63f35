// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Summarizer executor: aggregate the documents of a crawl into one
//! summary document, written back to the document store.

use crate::error::EngineError;
use crate::executors::agent::{AgentClient, AgentTurnRequest};
use crate::manager::JobManager;
use crate::registry::{ExecutionContext, JobExecutor};
use async_trait::async_trait;
use quaero_core::{Clock, JobId, JobMessage, JobStatus, LogLevel};
use quaero_storage::{Document, DocumentStore};
use serde::Deserialize;
use std::sync::Arc;

pub const WORKER_TYPE: &str = "summarizer";

/// Body excerpt length per document fed into the prompt.
const EXCERPT_LEN: usize = 1_000;

fn default_max_documents() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
struct SummarizerConfig {
    /// Job whose documents to summarize; defaults to the message parent.
    source_job_id: Option<String>,
    #[serde(default = "default_max_documents")]
    max_documents: u32,
    prompt: Option<String>,
    model: Option<String>,
}

pub struct SummarizerExecutor {
    manager: Arc<JobManager>,
    documents: DocumentStore,
    client: Arc<dyn AgentClient>,
    clock: Arc<dyn Clock>,
}

impl SummarizerExecutor {
    pub fn new(
        manager: Arc<JobManager>,
        documents: DocumentStore,
        client: Arc<dyn AgentClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { manager, documents, client, clock }
    }

    fn parse(message: &JobMessage) -> Result<(SummarizerConfig, JobId), EngineError> {
        let config: SummarizerConfig = if message.config.is_object() {
            serde_json::from_value(message.config.clone())
                .map_err(|e| EngineError::Validation(format!("bad summarizer config: {e}")))?
        } else {
            SummarizerConfig {
                source_job_id: None,
                max_documents: default_max_documents(),
                prompt: None,
                model: None,
            }
        };

        let source = config
            .source_job_id
            .clone()
            .map(JobId::from_string)
            .or_else(|| message.parent_id.clone())
            .ok_or_else(|| {
                EngineError::Validation("summarizer has no source job and no parent".into())
            })?;
        Ok((config, source))
    }

    fn build_prompt(config: &SummarizerConfig, docs: &[Document]) -> String {
        let mut prompt = config
            .prompt
            .clone()
            .unwrap_or_else(|| "Summarize the following documents into a concise digest.".into());
        for doc in docs {
            let excerpt: String = doc.body.chars().take(EXCERPT_LEN).collect();
            prompt.push_str("\n\n---\n");
            if let Some(title) = &doc.title {
                prompt.push_str(title);
                prompt.push('\n');
            }
            prompt.push_str(&doc.url);
            prompt.push('\n');
            prompt.push_str(&excerpt);
        }
        prompt
    }
}

#[async_trait]
impl JobExecutor for SummarizerExecutor {
    fn worker_type(&self) -> &str {
        WORKER_TYPE
    }

    fn validate(&self, message: &JobMessage) -> Result<(), EngineError> {
        Self::parse(message).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError> {
        let (config, source) = Self::parse(message)?;
        let job_id = &message.job_id;

        let docs = self.documents.list_for_job(&source, config.max_documents).await?;
        if docs.is_empty() {
            self.manager
                .add_job_log(job_id, LogLevel::Warn, format!("No documents under {source}; nothing to summarize"))
                .await;
            return self.finish(message).await;
        }

        if ctx.is_cancelled() {
            return Err(EngineError::Executor("cancelled before summarization".into()));
        }

        let response = self
            .client
            .complete(AgentTurnRequest {
                prompt: Self::build_prompt(&config, &docs),
                transcript: Vec::new(),
                model: config.model.clone(),
            })
            .await?;
        self.manager.touch_heartbeat(job_id).await;

        let summary = Document::from_fetch(
            format!("quaero://summaries/{source}"),
            Some(format!("Summary of {} document(s)", docs.len())),
            response.text,
            Some(source.clone()),
            self.clock.epoch_secs(),
        );
        self.documents.upsert(&summary).await?;

        self.manager
            .add_job_log(job_id, LogLevel::Info, format!("Summarized {} document(s)", docs.len()))
            .await;
        self.finish(message).await
    }
}

impl SummarizerExecutor {
    async fn finish(&self, message: &JobMessage) -> Result<(), EngineError> {
        match self.manager.update_job_status(&message.job_id, JobStatus::Completed, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "summarizer_tests.rs"]
mod tests;
