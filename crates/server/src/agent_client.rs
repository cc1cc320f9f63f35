// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal Gemini adapter for the agent-step and summarizer executors.
//!
//! The orchestration core only knows the [`AgentClient`] seam; this is
//! the one concrete adapter the binary ships. Each call is a single
//! completion — multi-turn loops ride on the step budget, with the
//! transcript folded into the prompt.

use async_trait::async_trait;
use quaero_engine::executors::{AgentClient, AgentTurnRequest, AgentTurnResponse};
use quaero_engine::EngineError;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_prompt(request: &AgentTurnRequest) -> String {
        if request.transcript.is_empty() {
            return request.prompt.clone();
        }
        let mut prompt = request.prompt.clone();
        prompt.push_str("\n\nPrevious turns:\n");
        for turn in &request.transcript {
            prompt.push_str(turn);
            prompt.push('\n');
        }
        prompt
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl AgentClient for GeminiClient {
    async fn complete(&self, request: AgentTurnRequest) -> Result<AgentTurnResponse, EngineError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!("{API_BASE}/{model}:generateContent");
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": Self::build_prompt(&request) }] }]
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Executor(format!("agent request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Executor(format!(
                "agent request returned status {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Executor(format!("agent response unreadable: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(EngineError::Executor("agent returned no text".into()));
        }

        // Single-completion adapter: every turn is an answer.
        Ok(AgentTurnResponse { text, final_answer: true })
    }
}
