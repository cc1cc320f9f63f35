// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared handler state.

use crate::config::Config;
use quaero_core::Clock;
use quaero_engine::{
    DefinitionRunner, EventBus, JobManager, LogService, QueueService, Scheduler,
};
use quaero_storage::DefinitionStore;
use std::sync::Arc;

/// Everything the HTTP and WebSocket layers need, cloneable per request.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub logs: LogService,
    pub queue: Arc<QueueService>,
    pub definitions: DefinitionStore,
    pub runner: Arc<DefinitionRunner>,
    pub scheduler: Arc<Scheduler>,
    pub bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}
