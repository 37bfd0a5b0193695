//! Command handlers: one span transition per process invocation.
//!
//! The shared shape of every closing command: resolve the context (flags
//! first, hand-off file second), close the span, forward the log record,
//! shut the pipeline down. Context resolution happens before any exporter
//! or HTTP client is constructed, so a missing context never touches the
//! network.

use crate::config::StitchConfig;
use chrono::Utc;
use stitch_core::{Error, HandoffRecord, Result, StepRecord, StepStatus, TraceContext, context};
use stitch_trace::{SpanClose, new_child_context, new_root_context};
use tracing::{info, warn};

/// Open the root span of a new trace. Nothing is exported yet; the span is
/// materialized when `end` closes it by identifier.
pub fn start(config: &StitchConfig, step: &str) -> Result<TraceContext> {
    let ctx = new_root_context();
    config
        .handoff()
        .push(HandoffRecord::new(step, ctx.clone(), Utc::now()))?;
    info!(step = %step, trace_id = %ctx.trace_id, "Opened root span");
    Ok(ctx)
}

/// Open a child span under an existing trace.
pub fn start_child(
    config: &StitchConfig,
    step: &str,
    trace_id: Option<String>,
    parent_span_id: Option<String>,
) -> Result<TraceContext> {
    let handoff = config.handoff();
    let top = handoff.peek()?;
    let parent = context::decode(
        "start-child",
        trace_id,
        parent_span_id,
        "parent-span-id",
        top.as_ref(),
    )?;

    let ctx = new_child_context(&parent);
    handoff.push(HandoffRecord::new(step, ctx.clone(), Utc::now()))?;
    info!(step = %step, trace_id = %ctx.trace_id, span_id = %ctx.span_id, "Opened child span");
    Ok(ctx)
}

/// Close a child span and forward its log record.
pub async fn end_child(
    config: &StitchConfig,
    step: &str,
    trace_id: Option<String>,
    span_id: Option<String>,
    status: StepStatus,
    error: Option<String>,
    duration_ms: Option<i64>,
) -> Result<StepRecord> {
    close_and_emit(
        config,
        "end-child",
        step,
        trace_id,
        span_id,
        "span-id",
        SpanClose {
            status,
            error,
            started_at: None,
            duration_ms,
        },
        false,
    )
    .await
}

/// Close the root span, forward the final log record, and remove the
/// hand-off file so stale context never leaks into a later job.
pub async fn end(
    config: &StitchConfig,
    step: &str,
    trace_id: Option<String>,
    parent_span_id: Option<String>,
    status: StepStatus,
    error: Option<String>,
) -> Result<StepRecord> {
    close_and_emit(
        config,
        "end",
        step,
        trace_id,
        // `start` prints the root span id as parent_span_id for its
        // children; `end` receives it back under the same flag.
        parent_span_id,
        "parent-span-id",
        SpanClose {
            status,
            error,
            started_at: None,
            duration_ms: None,
        },
        true,
    )
    .await
}

/// Run a command inside its own span: open, execute, close, emit, and exit
/// with the command's own code. With no parent identifiers and no hand-off
/// file this roots a new trace.
pub async fn run(
    config: &StitchConfig,
    step: &str,
    trace_id: Option<String>,
    parent_span_id: Option<String>,
    command: Vec<String>,
) -> Result<StepRecord> {
    let handoff = config.handoff();
    let parent = match context::decode(
        "run",
        trace_id,
        parent_span_id,
        "parent-span-id",
        handoff.peek()?.as_ref(),
    ) {
        Ok(parent) => Some(parent),
        Err(Error::MissingContext { .. }) => None,
        Err(e) => return Err(e),
    };

    let ctx = match &parent {
        Some(parent) => new_child_context(parent),
        None => new_root_context(),
    };
    let started_at = Utc::now();

    let (status, error, exit_code) = execute(&command).await;

    // The step outcome is already decided; the span is closed and the record
    // forwarded no matter what, then the command's failure is propagated.
    let pipeline = config.pipeline();
    let record = pipeline.close_span(
        step,
        &ctx,
        SpanClose {
            status,
            error: error.clone(),
            started_at: Some(started_at),
            duration_ms: None,
        },
    );
    pipeline.shutdown();
    emit_best_effort(config, &record).await;

    if status == StepStatus::Failure {
        return Err(Error::StepFailed {
            exit_code,
            message: error.unwrap_or_else(|| format!("`{}` failed", command.join(" "))),
        });
    }
    Ok(record)
}

async fn execute(command: &[String]) -> (StepStatus, Option<String>, i32) {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => return (StepStatus::Failure, Some("empty command".to_string()), 127),
    };

    match tokio::process::Command::new(program).args(args).status().await {
        Ok(status) if status.success() => (StepStatus::Success, None, 0),
        Ok(status) => {
            let exit_code = status.code().unwrap_or(1);
            let message = match status.code() {
                Some(code) => format!("`{}` exited with code {}", program, code),
                None => format!("`{}` terminated by signal", program),
            };
            (StepStatus::Failure, Some(message), exit_code)
        }
        Err(e) => (
            StepStatus::Failure,
            Some(format!("failed to spawn `{}`: {}", program, e)),
            127,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
async fn close_and_emit(
    config: &StitchConfig,
    command: &str,
    step: &str,
    trace_id: Option<String>,
    span_id: Option<String>,
    span_flag: &str,
    close: SpanClose,
    is_root: bool,
) -> Result<StepRecord> {
    let handoff = config.handoff();
    let top = handoff.peek()?;
    let ctx = context::decode(command, trace_id, span_id, span_flag, top.as_ref())?;

    // The hand-off record is only consumed when it matches the span being
    // closed; a record for an unrelated span is somebody else's context.
    let matched = top.filter(|record| record.span_id == ctx.span_id);
    if matched.is_some() {
        handoff.pop()?;
    }

    // The matching record carries what the flags cannot: the parent link and
    // the original start timestamp. Without it the span closes detached and
    // zero-length (or duration-backdated), never as an error.
    let ctx = match &matched {
        Some(record) => record.context(),
        None => ctx,
    };
    let close = SpanClose {
        started_at: matched.as_ref().map(|record| record.started_at),
        ..close
    };

    let pipeline = config.pipeline();
    let record = pipeline.close_span(step, &ctx, close);
    pipeline.shutdown();
    emit_best_effort(config, &record).await;

    if is_root {
        handoff.clear()?;
    }
    Ok(record)
}

/// Forward the record to the ingestion endpoint. Failures are logged and
/// swallowed; a lost log line never changes the process exit code.
async fn emit_best_effort(config: &StitchConfig, record: &StepRecord) {
    if let Some(emitter) = config.emitter() {
        if let Err(e) = emitter.emit(record, &config.metadata).await {
            warn!(error = %e, step = %record.step, "Failed to forward step record");
        }
    }
}
