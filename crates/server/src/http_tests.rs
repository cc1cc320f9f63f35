// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use quaero_engine::test_support::TestEngine;
use quaero_engine::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn fixture() -> (TestEngine, Router) {
    let engine = TestEngine::start().await;
    let scheduler = Arc::new(Scheduler::new(
        engine.definitions.clone(),
        engine.runner.clone(),
        engine.clock.clone(),
    ));
    let state = AppState {
        manager: engine.manager.clone(),
        logs: engine.logs.clone(),
        queue: engine.queue.clone(),
        definitions: engine.definitions.clone(),
        runner: engine.runner.clone(),
        scheduler,
        bus: engine.bus.clone(),
        clock: engine.clock.clone(),
        config: Arc::new(Config::default()),
    };
    let router = router(state);
    (engine, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

const SIMPLE_DEF: &str = r#"
id = "def-http"
name = "HTTP test"
type = "custom"

[[steps]]
name = "only"
type = "test_step"
"#;

const BAD_CRON_DEF: &str = r#"
id = "def-badcron"
name = "Bad cron"
type = "custom"
schedule = "every tuesday"

[[steps]]
name = "only"
type = "test_step"
"#;

#[tokio::test]
async fn unknown_job_is_404_with_stable_error_shape() {
    let (engine, router) = fixture().await;

    let (status, body) = send(&router, get("/api/jobs/job-ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("job-ghost"));

    engine.shutdown().await;
}

#[tokio::test]
async fn list_jobs_filters_by_status_and_parent() {
    let (engine, router) = fixture().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;
    engine
        .manager
        .update_job_status(&child, quaero_core::JobStatus::Running, None)
        .await
        .unwrap();

    let (status, body) = send(&router, get("/api/jobs?status=running")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], child.as_str());

    let uri = format!("/api/jobs?parent_id={parent}");
    let (_, body) = send(&router, get(&uri)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn get_job_returns_row() {
    let (engine, router) = fixture().await;
    let parent = engine.spawn_parent().await;

    let uri = format!("/api/jobs/{parent}");
    let (status, body) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], parent.as_str());
    assert_eq!(body["kind"], "parent");

    engine.shutdown().await;
}

#[tokio::test]
async fn delete_job_cascades_and_404s_after() {
    let (engine, router) = fixture().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;

    let uri = format!("/api/jobs/{parent}");
    let (status, _) = send(&router, delete(&uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, get(&format!("/api/jobs/{child}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    engine.shutdown().await;
}

#[tokio::test]
async fn cancel_endpoint_cancels_the_tree() {
    let (engine, router) = fixture().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;

    let uri = format!("/api/jobs/{parent}/cancel");
    let (status, body) = send(&router, post(&uri, "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let job = engine.manager.get_job(&child).await.unwrap();
    assert_eq!(job.status, quaero_core::JobStatus::Cancelled);

    engine.shutdown().await;
}

#[tokio::test]
async fn job_logs_use_clock_time_strings() {
    let (engine, router) = fixture().await;
    let parent = engine.spawn_parent().await;
    engine
        .manager
        .add_job_log(&parent, quaero_core::LogLevel::Info, "hello from test")
        .await;

    let uri = format!("/api/jobs/{parent}/logs");
    let (status, body) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let lines = body.as_array().unwrap();
    assert!(!lines.is_empty());
    let timestamp = lines[0]["timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), 8, "expected HH:MM:SS, got {timestamp}");
    assert_eq!(&timestamp[2..3], ":");

    engine.shutdown().await;
}

#[tokio::test]
async fn aggregated_logs_404_on_unknown_id() {
    let (engine, router) = fixture().await;

    let (status, body) = send(&router, get("/api/jobs/job-ghost/logs/aggregated")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    engine.shutdown().await;
}

#[tokio::test]
async fn aggregated_logs_merge_children() {
    let (engine, router) = fixture().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    let child = engine.spawn_child(&parent, serde_json::json!({})).await;
    engine.manager.add_job_log(&parent, quaero_core::LogLevel::Info, "parent line").await;
    engine.manager.add_job_log(&child, quaero_core::LogLevel::Info, "child line").await;

    let uri = format!("/api/jobs/{parent}/logs/aggregated");
    let (status, body) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let messages: Vec<&str> =
        body["logs"].as_array().unwrap().iter().map(|l| l["message"].as_str().unwrap()).collect();
    assert!(messages.contains(&"parent line"));
    assert!(messages.contains(&"child line"));
    assert!(body["correlation_id"].as_str().unwrap().starts_with("corr-"));

    engine.shutdown().await;
}

#[tokio::test]
async fn upload_rejects_broken_toml_without_inserting() {
    let (engine, router) = fixture().await;

    let (status, body) = send(&router, post("/api/job-definitions/upload", "name = \"oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failure");
    assert!(engine.definitions.list().await.unwrap().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn upload_saves_semantically_invalid_definition() {
    let (engine, router) = fixture().await;

    let (status, body) = send(&router, post("/api/job-definitions/upload", BAD_CRON_DEF)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation_status"], "invalid");
    assert!(body["validation_error"].as_str().unwrap().contains("invalid cron expression"));

    let row = engine
        .definitions
        .get(&quaero_core::DefinitionId::from_string("def-badcron"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.validation_status, "invalid");

    engine.shutdown().await;
}

#[tokio::test]
async fn upload_with_same_id_upserts() {
    let (engine, router) = fixture().await;

    let (status, _) = send(&router, post("/api/job-definitions/upload", SIMPLE_DEF)).await;
    assert_eq!(status, StatusCode::OK);
    let renamed = SIMPLE_DEF.replace("HTTP test", "HTTP test v2");
    let (status, _) = send(&router, post("/api/job-definitions/upload", &renamed)).await;
    assert_eq!(status, StatusCode::OK);

    let rows = engine.definitions.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "HTTP test v2");

    engine.shutdown().await;
}

#[tokio::test]
async fn execute_returns_instance_id_and_work_drains() {
    let (engine, router) = fixture().await;

    let (status, _) = send(&router, post("/api/job-definitions/upload", SIMPLE_DEF)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, post("/api/job-definitions/def-http/execute", "")).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = quaero_core::JobId::from_string(body["job_id"].as_str().unwrap());

    assert!(
        engine
            .wait_for_status(&job_id, quaero_core::JobStatus::Completed, Duration::from_secs(5))
            .await
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn validate_endpoint_persists_when_asked() {
    let (engine, router) = fixture().await;

    let (status, _) = send(&router, post("/api/job-definitions/upload", SIMPLE_DEF)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        post("/api/job-definitions/validate?job_id=def-http", BAD_CRON_DEF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation_status"], "invalid");

    let row = engine
        .definitions
        .get(&quaero_core::DefinitionId::from_string("def-http"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.validation_status, "invalid");

    engine.shutdown().await;
}

#[tokio::test]
async fn validate_endpoint_reports_syntax_errors_without_failing() {
    let (engine, router) = fixture().await;

    let (status, body) =
        send(&router, post("/api/job-definitions/validate", "name = \"oops")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation_status"], "invalid");
    assert!(body["validation_error"].as_str().unwrap().contains("toml parse error"));

    engine.shutdown().await;
}

#[tokio::test]
async fn queue_stats_endpoint_reports_counters() {
    let (engine, router) = fixture().await;
    engine.workers.stop(Duration::from_secs(2)).await;

    let parent = engine.spawn_parent().await;
    engine.spawn_child(&parent, serde_json::json!({})).await;

    let (status, body) = send(&router, get("/api/queue/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 1);

    engine.shutdown().await;
}
