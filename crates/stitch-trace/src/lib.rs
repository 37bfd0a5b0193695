//! Span lifecycle control for Stitch.
//!
//! A span here is a value, not an object: its identity is the
//! (trace_id, span_id) pair. Opening a step only mints identifiers and
//! records a start timestamp; the actual OpenTelemetry span is constructed
//! by whichever later process closes the step, scoped to the same
//! identifiers so the trace tree stitches together across process exits.

pub mod lifecycle;
pub mod tracer;

pub use lifecycle::{SpanClose, new_child_context, new_root_context};
pub use tracer::{ExporterConfig, TracePipeline, TracerError};
