// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron scheduler: a single-threaded tick loop that fires enabled job
//! definitions whose schedule matched since the previous tick.

use crate::error::EngineError;
use crate::runner::DefinitionRunner;
use chrono::{DateTime, TimeZone, Utc};
use cron::Schedule;
use quaero_core::Clock;
use quaero_definitions::JobDefinition;
use quaero_storage::DefinitionStore;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tick cadence. Schedules are minute-resolution in practice, so one
/// evaluation per minute is enough.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Evaluates definition schedules and triggers executions.
pub struct Scheduler {
    definitions: DefinitionStore,
    runner: Arc<DefinitionRunner>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        definitions: DefinitionStore,
        runner: Arc<DefinitionRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { definitions, runner, clock, tick_interval: TICK_INTERVAL }
    }

    /// Shorter tick for tests.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Launch the tick loop.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = self;
        tokio::spawn(async move {
            let mut last_tick = scheduler.now();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(scheduler.tick_interval) => {
                        let now = scheduler.now();
                        scheduler.tick(last_tick, now).await;
                        last_tick = now;
                    }
                }
            }
        })
    }

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.clock.epoch_secs(), 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Fire every scheduled definition whose cron matched in
    /// `(last_tick, now]`. A definition fires at most once per tick even
    /// if several match times elapsed (catch-up runs are not useful for
    /// crawls).
    pub async fn tick(&self, last_tick: DateTime<Utc>, now: DateTime<Utc>) {
        let rows = match self.definitions.list_scheduled().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "scheduler could not list definitions");
                return;
            }
        };

        for row in rows {
            let Some(schedule_str) = row.schedule.as_deref() else { continue };
            let schedule = match Schedule::from_str(schedule_str) {
                Ok(schedule) => schedule,
                Err(e) => {
                    // Validation should have caught this; skip defensively.
                    tracing::warn!(definition = %row.id, error = %e, "unparseable schedule");
                    continue;
                }
            };

            let due = schedule.after(&last_tick).next().is_some_and(|fire| fire <= now);
            if !due {
                continue;
            }

            match JobDefinition::parse(&row.toml) {
                Ok(def) => {
                    tracing::info!(definition = %row.id, name = %row.name, "schedule matched; executing");
                    if let Err(e) = self.runner.execute(&def).await {
                        tracing::error!(definition = %row.id, error = %e, "scheduled execution failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(definition = %row.id, error = %e, "stored definition no longer parses");
                }
            }
        }
    }

    /// Trigger one definition by row, outside its schedule.
    pub async fn run_now(&self, row_toml: &str) -> Result<quaero_core::JobId, EngineError> {
        let def = JobDefinition::parse(row_toml)?;
        self.runner.execute(&def).await
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
