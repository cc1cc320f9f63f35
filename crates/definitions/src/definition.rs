// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definition document model.

use crate::error::DefinitionError;
use quaero_core::DefinitionId;
use serde::{Deserialize, Serialize};

/// Category of a definition. `custom` definitions mix arbitrary step
/// types; the named categories exist for UI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionType {
    Crawler,
    Summarizer,
    Custom,
}

quaero_core::simple_display! {
    DefinitionType {
        Crawler => "crawler",
        Summarizer => "summarizer",
        Custom => "custom",
    }
}

/// Result of semantic validation, persisted with the definition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Unknown,
}

quaero_core::simple_display! {
    ValidationStatus {
        Valid => "valid",
        Invalid => "invalid",
        Unknown => "unknown",
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(ValidationStatus::Valid),
            "invalid" => Ok(ValidationStatus::Invalid),
            "unknown" => Ok(ValidationStatus::Unknown),
            other => Err(DefinitionError::Invalid(format!("unknown validation status: {other}"))),
        }
    }
}

/// How a run reacts to failing steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTolerance {
    /// Keep dispatching remaining steps after a failure. The parent
    /// still ends `failed` (failure dominates), but siblings get to run.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Abort dispatch after this many failures, when set.
    #[serde(default)]
    pub max_failures: Option<u32>,
}

/// One step of a definition; becomes one child job per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    pub name: String,
    /// Executor key (`crawler_url`, `agent_step`, …).
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Executor-specific configuration, passed through opaquely.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// A user-uploaded job definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Stable identity; generated when the document omits it. Uploading
    /// a document with an existing id upserts.
    #[serde(default)]
    pub id: DefinitionId,
    pub name: String,
    #[serde(rename = "type")]
    pub def_type: DefinitionType,
    /// Cron expression (seconds-resolution, 6 or 7 fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_start: bool,
    /// Names of steps dispatched before the main body.
    #[serde(default)]
    pub pre_jobs: Vec<String>,
    /// Names of steps dispatched after the main body.
    #[serde(default)]
    pub post_jobs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_tolerance: Option<ErrorTolerance>,
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

impl JobDefinition {
    /// Parse a TOML document. Syntax and shape errors are hard failures.
    pub fn parse(document: &str) -> Result<Self, DefinitionError> {
        Ok(toml::from_str(document)?)
    }

    /// Steps in dispatch order: pre-jobs, unlisted steps, post-jobs.
    pub fn ordered_steps(&self) -> Vec<&StepDef> {
        let by_name = |name: &String| self.steps.iter().find(|s| &s.name == name);

        let mut ordered: Vec<&StepDef> = Vec::with_capacity(self.steps.len());
        ordered.extend(self.pre_jobs.iter().filter_map(&by_name));
        ordered.extend(self.steps.iter().filter(|s| {
            !self.pre_jobs.contains(&s.name) && !self.post_jobs.contains(&s.name)
        }));
        ordered.extend(self.post_jobs.iter().filter_map(&by_name));
        ordered
    }
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
