// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket fan-out: pushes `{type, payload}` event envelopes to
//! connected clients.
//!
//! Each connection subscribes to a whitelist of event types (the UI
//! default set unless `?types=` narrows it). Slow clients drop events
//! rather than stalling publishers — the UI reconciles from the REST
//! API, the orchestrator from its backup poll.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use quaero_core::EventKind;
use serde::Deserialize;
use tokio::sync::mpsc;

/// Event types pushed when the client does not narrow the set.
pub const DEFAULT_EVENT_TYPES: [EventKind; 4] = [
    EventKind::LogEvent,
    EventKind::JobStatusChange,
    EventKind::ParentJobProgress,
    EventKind::CrawlProgress,
];

/// Per-connection outbound buffer; events beyond it are dropped.
const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Comma-separated event type whitelist, e.g.
    /// `types=log_event,parent_job_progress`.
    pub types: Option<String>,
}

/// Parse the `types` parameter; unknown names are ignored with a log
/// line, an empty or missing list falls back to the default set.
pub fn parse_whitelist(types: Option<&str>) -> Vec<EventKind> {
    let Some(types) = types else {
        return DEFAULT_EVENT_TYPES.to_vec();
    };

    let mut kinds = Vec::new();
    for name in types.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<EventKind>() {
            Ok(kind) => {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            Err(_) => tracing::debug!(name, "ignoring unknown event type in ws whitelist"),
        }
    }

    if kinds.is_empty() {
        DEFAULT_EVENT_TYPES.to_vec()
    } else {
        kinds
    }
}

pub async fn handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let kinds = parse_whitelist(query.types.as_deref());
    ws.on_upgrade(move |socket| serve_connection(socket, state, kinds))
}

async fn serve_connection(mut socket: WebSocket, state: AppState, kinds: Vec<EventKind>) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let subscriptions: Vec<_> = kinds
        .iter()
        .map(|kind| {
            let tx = tx.clone();
            state.bus.subscribe(*kind, move |event| {
                let tx = tx.clone();
                async move {
                    let envelope = event.envelope().to_string();
                    // Full buffer: drop rather than block the bus task.
                    let _ = tx.try_send(envelope);
                }
            })
        })
        .collect();
    drop(tx);
    tracing::debug!(types = ?kinds, "ws client connected");

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    // Clients only send control frames; axum answers
                    // pings itself, so anything readable is ignored.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for subscription in subscriptions {
        state.bus.unsubscribe(subscription);
    }
    tracing::debug!("ws client disconnected");
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
