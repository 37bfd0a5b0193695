//! CLI command definitions.
//!
//! Each invocation is a separate short-lived process performing at most one
//! span transition. Identifier flags are optional at the parser level: when
//! absent they are resolved from the hand-off file, and a context that
//! cannot be resolved exits 1 (not clap's 2) with a typed error.

use clap::Subcommand;
use stitch_core::StepStatus;

#[derive(Subcommand)]
pub enum Commands {
    /// Open the root span of a new trace
    Start {
        /// Step name
        #[arg(long)]
        step: String,
    },

    /// Open a child span under an existing trace
    StartChild {
        /// Step name
        #[arg(long)]
        step: String,

        /// Trace id produced by a prior `start`
        #[arg(long)]
        trace_id: Option<String>,

        /// Span id of the parent step
        #[arg(long)]
        parent_span_id: Option<String>,
    },

    /// Close a child span and emit its log record
    EndChild {
        /// Step name
        #[arg(long)]
        step: String,

        /// Trace id of the span being closed
        #[arg(long)]
        trace_id: Option<String>,

        /// Span id of the span being closed
        #[arg(long)]
        span_id: Option<String>,

        /// Step outcome, as reported by the orchestrator
        #[arg(long, default_value = "success")]
        status: StepStatus,

        /// Error message for failed steps
        #[arg(long)]
        error: Option<String>,

        /// Orchestrator-measured duration in milliseconds
        #[arg(long)]
        duration_ms: Option<i64>,
    },

    /// Close the root span, emit the final log record, and clean up
    End {
        /// Step name
        #[arg(long)]
        step: String,

        /// Trace id of the root span
        #[arg(long)]
        trace_id: Option<String>,

        /// Span id of the root span (as printed by `start`)
        #[arg(long)]
        parent_span_id: Option<String>,

        /// Step outcome, as reported by the orchestrator
        #[arg(long, default_value = "success")]
        status: StepStatus,

        /// Error message for failed steps
        #[arg(long)]
        error: Option<String>,
    },

    /// Run a command inside its own span, open-to-close in one process
    Run {
        /// Step name
        #[arg(long)]
        step: String,

        /// Trace id to attach to; a new trace is opened when absent
        #[arg(long)]
        trace_id: Option<String>,

        /// Span id of the parent step
        #[arg(long)]
        parent_span_id: Option<String>,

        /// Command to execute, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}
