// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn missing_parameter_uses_default_set() {
    assert_eq!(parse_whitelist(None), DEFAULT_EVENT_TYPES.to_vec());
}

#[parameterized(
    single = { "log_event", vec![EventKind::LogEvent] },
    multiple = { "job_status_change,parent_job_progress", vec![EventKind::JobStatusChange, EventKind::ParentJobProgress] },
    whitespace = { " crawl_progress , dead_letter ", vec![EventKind::CrawlProgress, EventKind::DeadLetter] },
    dedupes = { "log_event,log_event", vec![EventKind::LogEvent] },
)]
fn parses_comma_separated_types(input: &str, expected: Vec<EventKind>) {
    assert_eq!(parse_whitelist(Some(input)), expected);
}

#[test]
fn unknown_names_are_ignored() {
    let kinds = parse_whitelist(Some("log_event,warp_drive"));
    assert_eq!(kinds, vec![EventKind::LogEvent]);
}

#[test]
fn all_unknown_falls_back_to_default() {
    assert_eq!(parse_whitelist(Some("warp_drive")), DEFAULT_EVENT_TYPES.to_vec());
    assert_eq!(parse_whitelist(Some("")), DEFAULT_EVENT_TYPES.to_vec());
}
