//! Stitch Core
//!
//! Shared vocabulary for the cross-process trace stitcher: trace contexts,
//! hand-off records, step records, and error handling. This crate has minimal
//! dependencies and defines the types used across all other crates.

pub mod context;
pub mod error;
pub mod handoff;
pub mod record;

pub use context::TraceContext;
pub use error::{Error, Result};
pub use handoff::{HandoffFile, HandoffRecord};
pub use record::{JobMetadata, StepRecord, StepStatus};
