// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transient event types broadcast over the in-process bus.
//!
//! Events are not persisted. Serializes with `{"type": "event_name",
//! ...fields}`; the WebSocket boundary wraps the same data as
//! `{type, payload}` envelopes via [`Event::envelope`].

use crate::id::{JobId, MessageId};
use crate::job::{ChildStats, JobKind, JobStatus};
use crate::log::LogLevel;
use serde::{Deserialize, Serialize};

/// Events published on the in-process bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobCreated {
        job_id: JobId,
        job_type: String,
        kind: JobKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<JobId>,
    },

    JobStarted {
        job_id: JobId,
    },

    JobCompleted {
        job_id: JobId,
    },

    JobFailed {
        job_id: JobId,
        error: String,
    },

    /// Emitted after every committed status transition.
    JobStatusChange {
        job_id: JobId,
        status: JobStatus,
        kind: JobKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<JobId>,
    },

    /// Aggregated progress of one parent, recomputed on child transitions.
    ParentJobProgress {
        job_id: JobId,
        status: JobStatus,
        progress_text: String,
        /// Epoch seconds.
        timestamp: i64,
        total_children: u64,
        pending_children: u64,
        running_children: u64,
        completed_children: u64,
        failed_children: u64,
        cancelled_children: u64,
    },

    /// Raw child count snapshot for one parent.
    ChildJobStats {
        parent_id: JobId,
        total: u64,
        pending: u64,
        running: u64,
        completed: u64,
        failed: u64,
        cancelled: u64,
    },

    /// Live feed of a persisted job log line.
    LogEvent {
        job_id: JobId,
        /// Server-formatted `HH:MM:SS`; clients display it verbatim.
        timestamp: String,
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },

    CrawlProgress {
        job_id: JobId,
        url: String,
        depth: u32,
        pages_fetched: u64,
        page_budget: u64,
    },

    /// A queue message exhausted its redeliveries and was dropped.
    DeadLetter {
        message_id: MessageId,
        queue_name: String,
        job_id: JobId,
        receive_count: u32,
    },
}

impl Event {
    /// Build a `parent_job_progress` event from a stats snapshot.
    pub fn parent_progress(parent_id: JobId, stats: &ChildStats, timestamp: i64) -> Self {
        Event::ParentJobProgress {
            job_id: parent_id,
            status: stats.overall_status(),
            progress_text: stats.progress_text(),
            timestamp,
            total_children: stats.total,
            pending_children: stats.pending,
            running_children: stats.running,
            completed_children: stats.completed,
            failed_children: stats.failed,
            cancelled_children: stats.cancelled,
        }
    }

    /// Build a `child_job_stats` event from a stats snapshot.
    pub fn child_stats(parent_id: JobId, stats: &ChildStats) -> Self {
        Event::ChildJobStats {
            parent_id,
            total: stats.total,
            pending: stats.pending,
            running: stats.running,
            completed: stats.completed,
            failed: stats.failed,
            cancelled: stats.cancelled,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::JobCreated { .. } => EventKind::JobCreated,
            Event::JobStarted { .. } => EventKind::JobStarted,
            Event::JobCompleted { .. } => EventKind::JobCompleted,
            Event::JobFailed { .. } => EventKind::JobFailed,
            Event::JobStatusChange { .. } => EventKind::JobStatusChange,
            Event::ParentJobProgress { .. } => EventKind::ParentJobProgress,
            Event::ChildJobStats { .. } => EventKind::ChildJobStats,
            Event::LogEvent { .. } => EventKind::LogEvent,
            Event::CrawlProgress { .. } => EventKind::CrawlProgress,
            Event::DeadLetter { .. } => EventKind::DeadLetter,
        }
    }

    /// Level of a `log_event`; `None` for every other type (they bypass
    /// level filtering).
    pub fn log_level(&self) -> Option<LogLevel> {
        match self {
            Event::LogEvent { level, .. } => Some(*level),
            _ => None,
        }
    }

    /// The `{type, payload}` envelope pushed to WebSocket clients.
    pub fn envelope(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                let ty = map.remove("type").unwrap_or_default();
                serde_json::json!({ "type": ty, "payload": serde_json::Value::Object(map) })
            }
            _ => serde_json::json!({ "type": self.kind().to_string(), "payload": {} }),
        }
    }
}

/// Tag-only variant of [`Event`] used as a subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    JobCreated,
    JobStarted,
    JobCompleted,
    JobFailed,
    JobStatusChange,
    ParentJobProgress,
    ChildJobStats,
    LogEvent,
    CrawlProgress,
    DeadLetter,
}

crate::simple_display! {
    EventKind {
        JobCreated => "job_created",
        JobStarted => "job_started",
        JobCompleted => "job_completed",
        JobFailed => "job_failed",
        JobStatusChange => "job_status_change",
        ParentJobProgress => "parent_job_progress",
        ChildJobStats => "child_job_stats",
        LogEvent => "log_event",
        CrawlProgress => "crawl_progress",
        DeadLetter => "dead_letter",
    }
}

impl std::str::FromStr for EventKind {
    type Err = crate::job::ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_created" => Ok(EventKind::JobCreated),
            "job_started" => Ok(EventKind::JobStarted),
            "job_completed" => Ok(EventKind::JobCompleted),
            "job_failed" => Ok(EventKind::JobFailed),
            "job_status_change" => Ok(EventKind::JobStatusChange),
            "parent_job_progress" => Ok(EventKind::ParentJobProgress),
            "child_job_stats" => Ok(EventKind::ChildJobStats),
            "log_event" => Ok(EventKind::LogEvent),
            "crawl_progress" => Ok(EventKind::CrawlProgress),
            "dead_letter" => Ok(EventKind::DeadLetter),
            other => Err(crate::job::ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
