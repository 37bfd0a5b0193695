//! Carrier round-trip tests for stitch-core types.
//!
//! Simulates the process boundary: one `HandoffFile` handle writes and goes
//! away, a brand-new handle (as a fresh invocation would hold) reads back an
//! identical context.

use chrono::Utc;
use stitch_core::{HandoffFile, HandoffRecord, TraceContext};

const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const SPAN_ID: &str = "00f067aa0ba902b7";
const PARENT_ID: &str = "11f067aa0ba902b7";

#[test]
fn test_handoff_roundtrip_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handoff.json");

    let ctx = TraceContext::new(TRACE_ID, SPAN_ID)
        .unwrap()
        .with_parent(PARENT_ID);
    let started_at = Utc::now();

    // First invocation: open a step, persist the context, exit.
    {
        let writer = HandoffFile::new(&path);
        writer
            .push(HandoffRecord::new("Build", ctx.clone(), started_at))
            .unwrap();
    }

    // Second invocation: a fresh handle re-hydrates the same context.
    let reader = HandoffFile::new(&path);
    let record = reader.pop().unwrap().expect("record survives the boundary");

    assert_eq!(record.step, "Build");
    assert_eq!(record.started_at, started_at);
    assert_eq!(record.context(), ctx);
}

#[test]
fn test_traceparent_carries_the_same_context_over_http() {
    let ctx = TraceContext::new(TRACE_ID, SPAN_ID).unwrap();
    let rehydrated = TraceContext::from_traceparent(&ctx.to_traceparent()).unwrap();
    assert_eq!(rehydrated, ctx);

    let mut unsampled = ctx.clone();
    unsampled.sampled = false;
    let rehydrated = TraceContext::from_traceparent(&unsampled.to_traceparent()).unwrap();
    assert!(!rehydrated.sampled);
}

#[test]
fn test_output_lines_match_the_orchestrator_contract() {
    let ctx = TraceContext::new(TRACE_ID, SPAN_ID).unwrap();

    // `start` hands its own span id to children as parent_span_id.
    let parent_lines = ctx.to_parent_lines();
    let lines: Vec<&str> = parent_lines.lines().collect();
    assert_eq!(lines, vec![
        "trace_id=4bf92f3577b34da6a3ce929d0e0e4736",
        "parent_span_id=00f067aa0ba902b7",
    ]);

    // `start-child` hands out the child's own span id.
    let span_lines = ctx.to_span_lines();
    let lines: Vec<&str> = span_lines.lines().collect();
    assert_eq!(lines, vec![
        "trace_id=4bf92f3577b34da6a3ce929d0e0e4736",
        "span_id=00f067aa0ba902b7",
    ]);
}
