// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared by engine tests and workspace-level specs.

// Fixture setup panics on failure; these never run in production.
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::executors::agent::{AgentClient, AgentTurnRequest, AgentTurnResponse};
use crate::logs::LogService;
use crate::manager::JobManager;
use crate::orchestrator::Orchestrator;
use crate::queue::{QueueConfig, QueueService};
use crate::registry::{ExecutionContext, ExecutorRegistry, JobExecutor};
use crate::runner::DefinitionRunner;
use crate::worker::WorkerPool;
use async_trait::async_trait;
use parking_lot::Mutex;
use quaero_core::{Clock, Event, EventKind, Job, JobId, JobMessage, JobStatus, SystemClock};
use quaero_storage::{
    Database, DefinitionStore, DocumentStore, JobStore, LogStore, QueueStore,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ALL_KINDS: [EventKind; 10] = [
    EventKind::JobCreated,
    EventKind::JobStarted,
    EventKind::JobCompleted,
    EventKind::JobFailed,
    EventKind::JobStatusChange,
    EventKind::ParentJobProgress,
    EventKind::ChildJobStats,
    EventKind::LogEvent,
    EventKind::CrawlProgress,
    EventKind::DeadLetter,
];

/// Captures every event published on a bus.
#[derive(Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in ALL_KINDS {
            let sink = events.clone();
            bus.subscribe(kind, move |event| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(event);
                }
            });
        }
        Self { events }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events.lock().iter().filter(|e| e.kind() == kind).cloned().collect()
    }

    /// Poll until `pred` holds over the captured events, or time out.
    pub async fn wait_until<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&[Event]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if pred(&self.events.lock()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Scripted executor driven by the job config bag:
///
/// - `{"fail": true}` — marks the job failed and consumes the message
/// - `{"fail_transient": true}` — errors without touching the job, so
///   the message rides the visibility timeout back into the queue
/// - `{"invalid": true}` — fails validation
/// - `{"delay_ms": N}` — sleeps before finishing
pub struct TestExecutor {
    manager: Arc<JobManager>,
    executed: Arc<Mutex<Vec<JobId>>>,
}

pub const TEST_WORKER_TYPE: &str = "test_step";

impl TestExecutor {
    pub fn new(manager: Arc<JobManager>) -> Self {
        Self { manager, executed: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn executed(&self) -> Vec<JobId> {
        self.executed.lock().clone()
    }

    fn flag(message: &JobMessage, key: &str) -> bool {
        message.config.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

#[async_trait]
impl JobExecutor for TestExecutor {
    fn worker_type(&self) -> &str {
        TEST_WORKER_TYPE
    }

    fn validate(&self, message: &JobMessage) -> Result<(), EngineError> {
        if Self::flag(message, "invalid") {
            return Err(EngineError::Validation("scripted validation failure".into()));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        message: &JobMessage,
    ) -> Result<(), EngineError> {
        self.executed.lock().push(message.job_id.clone());

        if let Some(delay) = message.config.get("delay_ms").and_then(|v| v.as_u64()) {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(EngineError::Executor("cancelled mid-execution".into()));
                }
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
        }

        if Self::flag(message, "fail_transient") {
            return Err(EngineError::Executor("scripted transient failure".into()));
        }

        if Self::flag(message, "fail") {
            match self
                .manager
                .update_job_status(&message.job_id, JobStatus::Failed, Some("scripted failure"))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_terminal_transition() => {}
                Err(e) => return Err(e),
            }
            return Ok(());
        }

        match self.manager.update_job_status(&message.job_id, JobStatus::Completed, None).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Agent client returning scripted responses, then a default final
/// answer once the script runs out.
pub struct ScriptedAgentClient {
    responses: Mutex<VecDeque<AgentTurnResponse>>,
    requests: Mutex<Vec<AgentTurnRequest>>,
}

impl ScriptedAgentClient {
    pub fn new(responses: Vec<AgentTurnResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AgentTurnRequest> {
        self.requests.lock().clone()
    }
}

impl Default for ScriptedAgentClient {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl AgentClient for ScriptedAgentClient {
    async fn complete(&self, request: AgentTurnRequest) -> Result<AgentTurnResponse, EngineError> {
        self.requests.lock().push(request);
        Ok(self.responses.lock().pop_front().unwrap_or(AgentTurnResponse {
            text: "done".to_string(),
            final_answer: true,
        }))
    }
}

/// A fully wired engine over an in-memory store, with the scripted
/// test executor registered and every event recorded.
pub struct TestEngine {
    pub db: Database,
    pub bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub manager: Arc<JobManager>,
    pub logs: LogService,
    pub queue: Arc<QueueService>,
    pub registry: Arc<ExecutorRegistry>,
    pub workers: Arc<WorkerPool>,
    pub orchestrator: Arc<Orchestrator>,
    pub runner: Arc<DefinitionRunner>,
    pub documents: DocumentStore,
    pub definitions: DefinitionStore,
    pub recorder: EventRecorder,
    cancel: CancellationToken,
}

impl TestEngine {
    /// Fast-polling defaults for tests.
    pub fn test_config() -> QueueConfig {
        QueueConfig {
            poll_interval: Duration::from_millis(25),
            visibility_timeout: Duration::from_secs(2),
            ..QueueConfig::default()
        }
    }

    pub async fn start() -> Self {
        Self::start_with(Self::test_config()).await
    }

    pub async fn start_with(config: QueueConfig) -> Self {
        let db = Database::in_memory().await.unwrap_or_else(|e| panic!("open store: {e}"));
        db.migrate().await.unwrap_or_else(|e| panic!("migrate: {e}"));

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bus = EventBus::default();
        let recorder = EventRecorder::attach(&bus);
        let cancel = CancellationToken::new();

        let logs = LogService::new(LogStore::new(&db), JobStore::new(&db));
        logs.attach_bus(bus.clone());
        logs.spawn_flusher(cancel.clone());

        let manager = Arc::new(JobManager::new(JobStore::new(&db), logs.clone(), clock.clone()));
        manager.attach_bus(bus.clone());

        let queue = Arc::new(QueueService::new(QueueStore::new(&db), clock.clone(), config));
        queue.attach_bus(bus.clone());

        let registry = Arc::new(ExecutorRegistry::new());
        registry.register(Arc::new(TestExecutor::new(manager.clone())));

        let workers = Arc::new(WorkerPool::new(queue.clone(), manager.clone(), registry.clone()));
        Arc::clone(&workers).start();

        let orchestrator = Arc::new(
            Orchestrator::new(manager.clone(), bus.clone(), clock.clone())
                .with_poll_interval(Duration::from_millis(500)),
        );
        Arc::clone(&orchestrator).start(cancel.clone());

        let runner =
            Arc::new(DefinitionRunner::new(manager.clone(), queue.clone(), clock.clone()));

        Self {
            documents: DocumentStore::new(&db),
            definitions: DefinitionStore::new(&db),
            db,
            bus,
            clock,
            manager,
            logs,
            queue,
            registry,
            workers,
            orchestrator,
            runner,
            recorder,
            cancel,
        }
    }

    pub async fn shutdown(&self) {
        self.workers.stop(Duration::from_secs(5)).await;
        self.cancel.cancel();
        self.logs.flush().await;
    }

    /// Create a pending parent job row.
    pub async fn spawn_parent(&self) -> JobId {
        let parent = Job::parent(&self.clock);
        self.manager.create_job(&parent).await.unwrap_or_else(|e| panic!("create parent: {e}"))
    }

    /// Create a `test_step` child and enqueue its message.
    pub async fn spawn_child(&self, parent: &JobId, config: serde_json::Value) -> JobId {
        let child = Job::child(TEST_WORKER_TYPE, parent.clone(), &self.clock).with_config(config);
        let id = self
            .manager
            .create_job(&child)
            .await
            .unwrap_or_else(|e| panic!("create child: {e}"));
        let message = JobMessage::for_job(&child, self.clock.epoch_secs());
        self.queue.enqueue(&message).await.unwrap_or_else(|e| panic!("enqueue: {e}"));
        id
    }

    pub async fn wait_for_status(&self, id: &JobId, status: JobStatus, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(job) = self.manager.get_job(id).await {
                if job.status == status {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Wait until the queue table is empty.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if matches!(self.queue.depth().await, Ok(0)) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
