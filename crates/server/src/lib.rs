// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quaero-server: configuration, HTTP API, WebSocket fan-out, and
//! process wiring for the Quaero orchestration core.

pub mod agent_client;
pub mod config;
pub mod error;
pub mod http;
pub mod startup;
pub mod state;
pub mod ws;

pub use config::Config;
pub use error::ServerError;
pub use state::AppState;
