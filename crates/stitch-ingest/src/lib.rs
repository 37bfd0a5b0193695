//! Log forwarding for Stitch.
//!
//! One finished step record becomes one POST to the ingestion endpoint.
//! Delivery is best effort: single attempt, no retry, and callers uniformly
//! log-and-continue on failure. A lost log line never fails the pipeline.

pub mod emitter;

pub use emitter::{IngestError, LogEmitter, LogPayload};
