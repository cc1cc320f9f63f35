// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::definition::{JobDefinition, StepDef};
use yare::parameterized;

fn minimal() -> JobDefinition {
    JobDefinition::parse(
        r#"
name = "Minimal"
type = "custom"

[[steps]]
name = "only"
type = "test_step"
"#,
    )
    .unwrap()
}

#[test]
fn minimal_definition_is_valid() {
    assert!(validate(&minimal()).is_ok());
    let (status, error) = outcome(&minimal());
    assert_eq!(status, ValidationStatus::Valid);
    assert!(error.is_none());
}

#[test]
fn empty_name_is_invalid() {
    let mut def = minimal();
    def.name = "  ".to_string();
    assert!(validate(&def).is_err());
}

#[test]
fn no_steps_is_invalid() {
    let mut def = minimal();
    def.steps.clear();
    let (status, error) = outcome(&def);
    assert_eq!(status, ValidationStatus::Invalid);
    assert!(error.unwrap().contains("no steps"));
}

#[test]
fn duplicate_step_names_are_invalid() {
    let mut def = minimal();
    def.steps.push(StepDef {
        name: "only".to_string(),
        step_type: "test_step".to_string(),
        url: None,
        config: serde_json::Value::Null,
    });
    let (_, error) = outcome(&def);
    assert!(error.unwrap().contains("duplicate step name"));
}

#[test]
fn pre_jobs_must_reference_steps() {
    let mut def = minimal();
    def.pre_jobs.push("ghost".to_string());
    let (_, error) = outcome(&def);
    assert!(error.unwrap().contains("unknown step 'ghost'"));
}

#[parameterized(
    every_six_am = { "0 0 6 * * *" },
    every_minute = { "0 * * * * *" },
    with_year = { "0 5 22 * * * 2031" },
)]
fn good_cron_expressions_pass(expr: &str) {
    let mut def = minimal();
    def.schedule = Some(expr.to_string());
    assert!(validate(&def).is_ok());
}

#[parameterized(
    words = { "every tuesday" },
    too_few_fields = { "* *" },
    bad_field = { "0 0 25 * * *" },
)]
fn bad_cron_expressions_fail(expr: &str) {
    let mut def = minimal();
    def.schedule = Some(expr.to_string());
    let (status, error) = outcome(&def);
    assert_eq!(status, ValidationStatus::Invalid);
    assert!(error.unwrap().contains("invalid cron expression"));
}

#[test]
fn zero_max_failures_is_invalid() {
    let mut def = minimal();
    def.error_tolerance = Some(crate::definition::ErrorTolerance {
        continue_on_error: true,
        max_failures: Some(0),
    });
    assert!(validate(&def).is_err());
}
