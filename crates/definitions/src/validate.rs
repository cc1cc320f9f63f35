// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic validation of parsed definitions.
//!
//! Validation failures do not reject an upload; the document is saved
//! with `validation_status = invalid` and the first error message.

use crate::definition::{JobDefinition, ValidationStatus};
use crate::error::DefinitionError;
use std::str::FromStr;

/// Check every semantic rule; returns the first violation.
pub fn validate(def: &JobDefinition) -> Result<(), DefinitionError> {
    if def.name.trim().is_empty() {
        return Err(DefinitionError::Invalid("definition name must not be empty".into()));
    }

    if def.steps.is_empty() {
        return Err(DefinitionError::Invalid("definition has no steps".into()));
    }

    for step in &def.steps {
        if step.name.trim().is_empty() {
            return Err(DefinitionError::Invalid("step name must not be empty".into()));
        }
        if step.step_type.trim().is_empty() {
            return Err(DefinitionError::Invalid(format!(
                "step '{}' has no type",
                step.name
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for step in &def.steps {
        if !seen.insert(step.name.as_str()) {
            return Err(DefinitionError::Invalid(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
    }

    for (list, label) in [(&def.pre_jobs, "pre_jobs"), (&def.post_jobs, "post_jobs")] {
        for name in list {
            if !def.steps.iter().any(|s| &s.name == name) {
                return Err(DefinitionError::Invalid(format!(
                    "{label} references unknown step '{name}'"
                )));
            }
        }
    }

    if let Some(schedule) = &def.schedule {
        cron::Schedule::from_str(schedule).map_err(|e| {
            DefinitionError::Invalid(format!("invalid cron expression '{schedule}': {e}"))
        })?;
    }

    if let Some(tolerance) = &def.error_tolerance {
        if tolerance.max_failures == Some(0) {
            return Err(DefinitionError::Invalid(
                "error_tolerance.max_failures must be at least 1".into(),
            ));
        }
    }

    Ok(())
}

/// Validation result as the `(status, error)` pair stored on the row.
pub fn outcome(def: &JobDefinition) -> (ValidationStatus, Option<String>) {
    match validate(def) {
        Ok(()) => (ValidationStatus::Valid, None),
        Err(e) => (ValidationStatus::Invalid, Some(e.to_string())),
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
