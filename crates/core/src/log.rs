// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job log entries and level ordering.

use crate::id::JobId;
use serde::{Deserialize, Serialize};

/// Severity of a job log line. Ordering is `debug < info < warn < error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::job::ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(crate::job::ParseStatusError(other.to_string())),
        }
    }
}

/// One persisted log line belonging to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: JobId,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl JobLogEntry {
    pub fn new(
        job_id: JobId,
        level: LogLevel,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self { job_id, timestamp_ms, level, message: message.into(), correlation_id: None }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Format an epoch-milliseconds timestamp as the boundary `HH:MM:SS` string.
///
/// Clients display this string verbatim; they never recompute it.
pub fn format_clock_time(epoch_ms: i64) -> String {
    let day_secs = (epoch_ms / 1000).rem_euclid(86_400);
    format!(
        "{:02}:{:02}:{:02}",
        day_secs / 3600,
        (day_secs % 3600) / 60,
        day_secs % 60
    )
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
