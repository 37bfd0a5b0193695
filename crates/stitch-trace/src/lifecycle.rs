//! Span lifecycle: `NotStarted -> Open -> Closed`, across process exits.
//!
//! Opening a step mints identifiers and a start timestamp; nothing is
//! exported until the step is closed. Closing recreates a span scoped to the
//! same (trace_id, span_id) pair, with the parent injected as a remote span
//! context, so the closing timestamp and attributes land on the span the
//! opening process announced. Ordering is a caller contract: within one
//! trace the orchestrator must close all children before closing the parent;
//! nothing here enforces it. Closing is deliberately not idempotent: two
//! `end` calls export two spans.

use crate::tracer::TracePipeline;
use chrono::{DateTime, TimeDelta, Utc};
use opentelemetry::trace::{
    Span as _, SpanContext, SpanId, SpanKind, Status, TraceContextExt, TraceFlags, TraceId,
    TraceState, Tracer,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};
use stitch_core::{StepRecord, StepStatus, TraceContext};
use tracing::warn;

/// Mint a fresh root context: new trace id, new span id.
pub fn new_root_context() -> TraceContext {
    let generator = RandomIdGenerator::default();
    TraceContext {
        trace_id: format!("{:032x}", generator.new_trace_id()),
        span_id: format!("{:016x}", generator.new_span_id()),
        parent_span_id: None,
        sampled: true,
    }
}

/// Mint a child context: new span id under the parent's trace id.
pub fn new_child_context(parent: &TraceContext) -> TraceContext {
    let generator = RandomIdGenerator::default();
    TraceContext {
        trace_id: parent.trace_id.clone(),
        span_id: format!("{:016x}", generator.new_span_id()),
        parent_span_id: Some(parent.span_id.clone()),
        sampled: parent.sampled,
    }
}

/// Closing parameters supplied by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SpanClose {
    pub status: StepStatus,
    pub error: Option<String>,
    /// Start timestamp recovered from the hand-off record, when available.
    pub started_at: Option<DateTime<Utc>>,
    /// Orchestrator-measured duration, used when no start timestamp survived.
    pub duration_ms: Option<i64>,
}

impl TracePipeline {
    /// Close the span identified by `ctx` and return its finished record.
    ///
    /// The process that opened the span is gone, so a new span is built here
    /// carrying the original identifiers and the recovered start timestamp.
    /// When no start information survived the boundary the span degrades to
    /// zero length at the closing timestamp. A context whose parent is
    /// unknown yields a detached span rather than an error.
    pub fn close_span(&self, step: &str, ctx: &TraceContext, close: SpanClose) -> StepRecord {
        let ended_at = Utc::now();
        let started_at = close
            .started_at
            .or_else(|| {
                close
                    .duration_ms
                    .map(|ms| ended_at - TimeDelta::milliseconds(ms))
            })
            .unwrap_or(ended_at);

        let record = StepRecord::open(step, ctx, started_at).complete(
            ended_at,
            close.status,
            close.error.clone(),
        );

        if let Some(inner) = self.inner() {
            match (
                TraceId::from_hex(&ctx.trace_id),
                SpanId::from_hex(&ctx.span_id),
            ) {
                (Ok(trace_id), Ok(span_id)) => {
                    export_span(&inner.tracer, trace_id, span_id, ctx, &record);
                }
                _ => {
                    warn!(
                        trace_id = %ctx.trace_id,
                        span_id = %ctx.span_id,
                        "Unparseable identifiers, span not exported"
                    );
                }
            }
        }

        record
    }
}

fn export_span(
    tracer: &opentelemetry_sdk::trace::Tracer,
    trace_id: TraceId,
    span_id: SpanId,
    ctx: &TraceContext,
    record: &StepRecord,
) {
    let flags = if ctx.sampled {
        TraceFlags::SAMPLED
    } else {
        TraceFlags::default()
    };

    // The parent, when known, is injected as a remote span context. An
    // unknown parent leaves the span detached under the same trace id.
    let parent_cx = match ctx
        .parent_span_id
        .as_deref()
        .and_then(|p| SpanId::from_hex(p).ok())
    {
        Some(parent_id) => Context::new().with_remote_span_context(SpanContext::new(
            trace_id,
            parent_id,
            flags,
            true,
            TraceState::default(),
        )),
        None => Context::new(),
    };

    let mut attributes = vec![
        KeyValue::new("ci.step.name", record.step.clone()),
        KeyValue::new("ci.step.status", record.status.as_str()),
    ];
    if let Some(duration_ms) = record.duration_ms {
        attributes.push(KeyValue::new("ci.step.duration_ms", duration_ms));
    }
    if let Some(error) = &record.error {
        attributes.push(KeyValue::new("error.message", error.clone()));
    }

    let mut span = tracer
        .span_builder(record.step.clone())
        .with_kind(SpanKind::Internal)
        .with_trace_id(trace_id)
        .with_span_id(span_id)
        .with_start_time(std::time::SystemTime::from(record.started_at))
        .with_attributes(attributes)
        .start_with_context(tracer, &parent_cx);

    match record.status {
        StepStatus::Success => span.set_status(Status::Ok),
        StepStatus::Failure => span.set_status(Status::error(
            record.error.clone().unwrap_or_else(|| "step failed".to_string()),
        )),
        StepStatus::Pending => {}
    }

    let end = record
        .ended_at
        .map(std::time::SystemTime::from)
        .unwrap_or_else(std::time::SystemTime::now);
    span.end_with_timestamp(end);
}
