// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe bus for transient events.
//!
//! `publish` never blocks the caller: every subscriber runs on its own
//! spawned task, and subscriber panics are caught and logged. Delivery
//! is best-effort — the orchestrator's backup poll reconciles anything
//! a dropped event would have missed.

use futures_util::FutureExt;
use parking_lot::RwLock;
use quaero_core::{Event, EventKind, LogLevel};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type BoxedHandler = Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Token returned by [`EventBus::subscribe`]; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct BusInner {
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, BoxedHandler)>>>,
    next_id: AtomicU64,
    /// Minimum level applied to `log_event` only; other kinds bypass it.
    min_log_level: LogLevel,
}

/// Cheaply cloneable handle to the bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(min_log_level: LogLevel) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                min_log_level,
            }),
        }
    }

    /// Register `handler` for one event kind. The handler is invoked on
    /// a fresh task per event.
    pub fn subscribe<F, Fut>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let boxed: BoxedHandler = Arc::new(move |event| Box::pin(handler(event)));
        self.inner.subscribers.write().entry(kind).or_default().push((id, boxed));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.inner.subscribers.write();
        for handlers in subscribers.values_mut() {
            handlers.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Fire-and-forget dispatch. Events below the configured minimum
    /// level are dropped for `log_event` only.
    pub fn publish(&self, event: Event) {
        if let Some(level) = event.log_level() {
            if level < self.inner.min_log_level {
                return;
            }
        }

        let handlers: Vec<BoxedHandler> = {
            let subscribers = self.inner.subscribers.read();
            match subscribers.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, h)| h.clone()).collect(),
                None => return,
            }
        };

        for handler in handlers {
            let event = event.clone();
            let kind = event.kind();
            tokio::spawn(async move {
                if AssertUnwindSafe(handler(event)).catch_unwind().await.is_err() {
                    tracing::warn!(event = %kind, "event subscriber panicked");
                }
            });
        }
    }

    /// Number of live subscriptions for one kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.subscribers.read().get(&kind).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
