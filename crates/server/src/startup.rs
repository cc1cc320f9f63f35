// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process wiring: build the engine from configuration, serve HTTP,
//! shut down in order.

use crate::agent_client::GeminiClient;
use crate::config::Config;
use crate::error::ServerError;
use crate::http;
use crate::state::AppState;
use quaero_core::{Clock, SystemClock};
use quaero_definitions::JobDefinition;
use quaero_engine::executors::{
    AgentClient, AgentStepExecutor, CrawlerExecutor, MaintenanceExecutor, SummarizerExecutor,
};
use quaero_engine::{
    DefinitionRunner, EventBus, ExecutorRegistry, JobManager, LogService, Orchestrator,
    QueueService, Scheduler, WorkerPool,
};
use quaero_storage::{
    Database, DefinitionStore, DocumentStore, JobStore, LogStore, QueueStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drain budget for the worker pool on shutdown.
const STOP_DEADLINE: Duration = Duration::from_secs(30);

/// A fully wired process, ready to serve.
pub struct App {
    pub state: AppState,
    pub workers: Arc<WorkerPool>,
    pub cancel: CancellationToken,
}

/// Construct every component against the configured store.
///
/// Wiring order matters: the bus is attached to the manager, log
/// service, and queue after construction (optional capability), which
/// keeps the manager/bus/orchestrator dependency cycle out of the
/// constructors.
pub async fn build(config: Config) -> Result<App, ServerError> {
    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cancel = CancellationToken::new();

    let db = Database::open(&config.store_config()).await?;
    db.migrate().await?;

    let bus = EventBus::new(config.logging.min_event_level);

    let logs = LogService::new(LogStore::new(&db), JobStore::new(&db));
    logs.attach_bus(bus.clone());
    logs.spawn_flusher(cancel.clone());

    let manager = Arc::new(JobManager::new(JobStore::new(&db), logs.clone(), clock.clone()));
    manager.attach_bus(bus.clone());

    let queue = Arc::new(QueueService::new(
        QueueStore::new(&db),
        clock.clone(),
        config.queue_config(),
    ));
    queue.attach_bus(bus.clone());

    let documents = DocumentStore::new(&db);
    let definitions = DefinitionStore::new(&db);

    let registry = Arc::new(ExecutorRegistry::new());
    registry.register(Arc::new(CrawlerExecutor::new(
        manager.clone(),
        queue.clone(),
        documents.clone(),
        bus.clone(),
        clock.clone(),
    )));
    registry.register(Arc::new(MaintenanceExecutor::new(manager.clone(), db.clone())));

    match &config.agent.google_api_key {
        Some(api_key) => {
            let client: Arc<dyn AgentClient> =
                Arc::new(GeminiClient::new(api_key, config.agent.model.clone()));
            registry.register(Arc::new(AgentStepExecutor::new(
                manager.clone(),
                queue.clone(),
                client.clone(),
                clock.clone(),
            )));
            registry.register(Arc::new(SummarizerExecutor::new(
                manager.clone(),
                documents.clone(),
                client,
                clock.clone(),
            )));
        }
        None => {
            tracing::warn!("no agent api key configured; agent_step and summarizer executors disabled");
        }
    }

    let workers = Arc::new(WorkerPool::new(queue.clone(), manager.clone(), registry.clone()));
    Arc::clone(&workers).start();

    let orchestrator = Arc::new(Orchestrator::new(manager.clone(), bus.clone(), clock.clone()));
    Arc::clone(&orchestrator).start(cancel.clone());

    let runner = Arc::new(DefinitionRunner::new(manager.clone(), queue.clone(), clock.clone()));
    let scheduler = Arc::new(Scheduler::new(definitions.clone(), runner.clone(), clock.clone()));
    Arc::clone(&scheduler).start(cancel.clone());

    let state = AppState {
        manager,
        logs,
        queue,
        definitions,
        runner,
        scheduler,
        bus,
        clock,
        config,
    };

    revalidate_definitions(&state).await;
    auto_start_definitions(&state).await;

    Ok(App { state, workers, cancel })
}

/// Re-validate every stored definition. Idempotent: re-running at each
/// startup converges on the same stored statuses.
async fn revalidate_definitions(state: &AppState) {
    let rows = match state.definitions.list().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "could not list definitions for revalidation");
            return;
        }
    };

    for row in rows {
        let (status, error) = match JobDefinition::parse(&row.toml) {
            Ok(def) => quaero_definitions::validate::outcome(&def),
            Err(e) => (quaero_definitions::ValidationStatus::Invalid, Some(e.to_string())),
        };
        let result = state
            .definitions
            .set_validation(&row.id, &status.to_string(), error.as_deref(), state.clock.epoch_secs())
            .await;
        if let Err(e) = result {
            tracing::warn!(definition = %row.id, error = %e, "failed to persist validation status");
        }
    }
}

/// Kick off definitions flagged `auto_start` (enabled and valid only).
async fn auto_start_definitions(state: &AppState) {
    let rows = match state.definitions.list().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "could not list definitions for auto-start");
            return;
        }
    };

    for row in rows {
        if !row.enabled || !row.auto_start || row.validation_status != "valid" {
            continue;
        }
        match JobDefinition::parse(&row.toml) {
            Ok(def) => match state.runner.execute(&def).await {
                Ok(job_id) => {
                    tracing::info!(definition = %row.id, job_id = %job_id, "auto-started definition");
                }
                Err(e) => {
                    tracing::error!(definition = %row.id, error = %e, "auto-start failed");
                }
            },
            Err(e) => {
                tracing::warn!(definition = %row.id, error = %e, "auto-start definition no longer parses");
            }
        }
    }
}

/// Build, bind, and serve until interrupted, then drain.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let addr = config.bind_addr();
    let app = build(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    tracing::info!(%addr, "quaero listening");

    let router = http::router(app.state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Stop accepting work, drain pollers, flush logs.
    app.workers.stop(STOP_DEADLINE).await;
    app.cancel.cancel();
    app.state.logs.flush().await;
    tracing::info!("shutdown complete");
    Ok(())
}
