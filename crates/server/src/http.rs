// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API consumed by the UI and the MCP adapter.
//!
//! Errors cross the boundary as a stable `{error, message, details?}`
//! JSON body; `ErrJobNotFound` maps to 404, validation problems to 400.

use crate::state::AppState;
use crate::ws;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use quaero_core::{format_clock_time, DefinitionId, JobId, JobKind, JobLogEntry, JobStatus};
use quaero_definitions::validate::{outcome, validate};
use quaero_definitions::{JobDefinition, ValidationStatus};
use quaero_engine::EngineError;
use quaero_storage::{DefinitionRow, JobFilter};
use serde::{Deserialize, Serialize};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:id", get(get_job).delete(delete_job))
        .route("/api/jobs/:id/cancel", post(cancel_job))
        .route("/api/jobs/:id/logs", get(get_job_logs))
        .route("/api/jobs/:id/logs/aggregated", get(get_job_logs_aggregated))
        .route("/api/job-definitions", get(list_definitions))
        .route("/api/job-definitions/upload", post(upload_definition))
        .route("/api/job-definitions/validate", post(validate_definition))
        .route(
            "/api/job-definitions/:id",
            put(update_definition).delete(delete_definition),
        )
        .route("/api/job-definitions/:id/execute", post(execute_definition))
        .route("/api/queue/stats", get(queue_stats))
        .route("/ws", get(ws::handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Error envelope for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            EngineError::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            EngineError::Validation(_) | EngineError::Definition(_) => {
                (StatusCode::BAD_REQUEST, "validation_failure")
            }
            EngineError::TerminalTransition { .. } => {
                (StatusCode::BAD_REQUEST, "terminal_transition")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error on http boundary");
        }
        let body = ErrorBody { error, message: self.0.to_string(), details: None };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub status: Option<JobStatus>,
    pub parent_id: Option<String>,
    pub kind: Option<JobKind>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub limit: Option<u32>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = JobFilter {
        status: query.status,
        parent_id: query.parent_id.map(JobId::from_string),
        kind: query.kind,
        job_type: query.job_type,
        limit: query.limit,
    };
    let jobs = state.manager.list_jobs(&filter).await?;
    Ok(Json(jobs))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.manager.get_job(&JobId::from_string(id)).await?;
    Ok(Json(job))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.manager.delete_job(&JobId::from_string(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::from_string(id);
    state.manager.cancel_job(&id).await?;
    let job = state.manager.get_job(&id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

/// Log line as shipped to clients: the timestamp is pre-formatted
/// `HH:MM:SS` and must be displayed verbatim.
#[derive(Debug, Serialize)]
struct LogLine {
    timestamp: String,
    level: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl From<JobLogEntry> for LogLine {
    fn from(entry: JobLogEntry) -> Self {
        Self {
            timestamp: format_clock_time(entry.timestamp_ms),
            level: entry.level.to_string(),
            message: entry.message,
            correlation_id: entry.correlation_id,
        }
    }
}

async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::from_string(id);
    // 404 for unknown jobs, empty list for known-but-quiet ones.
    state.manager.get_job(&id).await?;
    let entries = state.logs.get_logs(&id, query.limit.unwrap_or(100)).await?;
    let lines: Vec<LogLine> = entries.into_iter().map(LogLine::from).collect();
    Ok(Json(lines))
}

async fn get_job_logs_aggregated(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let aggregated = state
        .logs
        .get_logs_aggregated(&JobId::from_string(id), query.limit.unwrap_or(500))
        .await?;
    let lines: Vec<LogLine> = aggregated.entries.into_iter().map(LogLine::from).collect();
    Ok(Json(serde_json::json!({
        "logs": lines,
        "metadata": aggregated.metadata,
        "correlation_id": aggregated.correlation_id,
    })))
}

#[derive(Debug, Serialize)]
struct DefinitionDto {
    id: String,
    name: String,
    #[serde(rename = "type")]
    def_type: String,
    schedule: Option<String>,
    enabled: bool,
    auto_start: bool,
    validation_status: String,
    validation_error: Option<String>,
    validated_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl From<DefinitionRow> for DefinitionDto {
    fn from(row: DefinitionRow) -> Self {
        Self {
            id: row.id.to_string(),
            name: row.name,
            def_type: row.def_type,
            schedule: row.schedule,
            enabled: row.enabled,
            auto_start: row.auto_start,
            validation_status: row.validation_status,
            validation_error: row.validation_error,
            validated_at: row.validated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn list_definitions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.definitions.list().await.map_err(EngineError::from)?;
    let dtos: Vec<DefinitionDto> = rows.into_iter().map(DefinitionDto::from).collect();
    Ok(Json(dtos))
}

/// Build the row for a parsed definition, preserving `created_at` on
/// upsert so repeated uploads of the same id stay idempotent.
async fn definition_row(
    state: &AppState,
    def: &JobDefinition,
    document: &str,
) -> Result<DefinitionRow, EngineError> {
    let (status, error) = outcome(def);
    let now = state.clock.epoch_secs();
    let existing = state.definitions.get(&def.id).await?;
    Ok(DefinitionRow {
        id: def.id.clone(),
        name: def.name.clone(),
        def_type: def.def_type.to_string(),
        toml: document.to_string(),
        schedule: def.schedule.clone(),
        enabled: def.enabled,
        auto_start: def.auto_start,
        validation_status: status.to_string(),
        validation_error: error,
        validated_at: Some(now),
        created_at: existing.map(|e| e.created_at).unwrap_or(now),
        updated_at: now,
    })
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    id: String,
    validation_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_error: Option<String>,
}

/// Upload a TOML document. Syntax errors reject with 400 and insert
/// nothing; semantically invalid documents are saved with
/// `validation_status = invalid` (the save-invalid flow).
async fn upload_definition(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let def = JobDefinition::parse(&body).map_err(EngineError::from)?;
    let row = definition_row(&state, &def, &body).await?;
    state.definitions.upsert(&row).await.map_err(EngineError::from)?;

    Ok(Json(UploadResponse {
        id: row.id.to_string(),
        validation_status: row.validation_status,
        validation_error: row.validation_error,
    }))
}

async fn update_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let mut def = JobDefinition::parse(&body).map_err(EngineError::from)?;
    // The path wins over whatever the document claims.
    def.id = DefinitionId::from_string(&id);

    let row = definition_row(&state, &def, &body).await?;
    state.definitions.upsert(&row).await.map_err(EngineError::from)?;
    Ok(Json(UploadResponse {
        id: row.id.to_string(),
        validation_status: row.validation_status,
        validation_error: row.validation_error,
    }))
}

async fn delete_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .definitions
        .delete(&DefinitionId::from_string(&id))
        .await
        .map_err(EngineError::from)?;
    if !deleted {
        return Err(EngineError::Validation(format!("no definition with id '{id}'")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    job_id: String,
}

/// Trigger one execution; responds as soon as the instance exists.
async fn execute_definition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = DefinitionId::from_string(&id);
    let row = state
        .definitions
        .get(&id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::Validation(format!("no definition with id '{id}'")))?;

    let def = JobDefinition::parse(&row.toml).map_err(EngineError::from)?;
    validate(&def).map_err(EngineError::from)?;

    let job_id = state.runner.execute(&def).await?;
    Ok(Json(ExecuteResponse { job_id: job_id.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub job_id: Option<String>,
}

/// Validate a TOML body without saving it. With `?job_id=`, the result
/// is persisted onto that stored definition.
async fn validate_definition(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let (status, error) = match JobDefinition::parse(&body) {
        Ok(def) => outcome(&def),
        Err(e) => (ValidationStatus::Invalid, Some(e.to_string())),
    };

    if let Some(id) = &query.job_id {
        state
            .definitions
            .set_validation(
                &DefinitionId::from_string(id),
                &status.to_string(),
                error.as_deref(),
                state.clock.epoch_secs(),
            )
            .await
            .map_err(EngineError::from)?;
    }

    Ok(Json(serde_json::json!({
        "validation_status": status.to_string(),
        "validation_error": error,
    })))
}

async fn queue_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.queue.stats().await?;
    Ok(Json(stats))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
