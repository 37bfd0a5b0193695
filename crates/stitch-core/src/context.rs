//! Trace context propagation across process boundaries.
//!
//! A span is identified by its (trace_id, span_id) value pair, not by an
//! in-memory object. Any process holding the pair may legally continue or
//! close a span it did not create, which is what lets one CI job appear as a
//! single trace even though every step runs in its own short-lived process.

use crate::error::{Error, Result};
use crate::handoff::HandoffRecord;
use serde::{Deserialize, Serialize};

/// Trace context carried between process invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// 128-bit trace identifier, 32 lowercase hex chars.
    pub trace_id: String,
    /// 64-bit span identifier, 16 lowercase hex chars.
    pub span_id: String,
    /// Span id of the parent, when known.
    pub parent_span_id: Option<String>,
    /// Sampling decision, carried unchanged across the boundary.
    pub sampled: bool,
}

impl TraceContext {
    /// Create a validated trace context.
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Result<Self> {
        let trace_id = trace_id.into();
        let span_id = span_id.into();

        if !is_valid_trace_id(&trace_id) {
            return Err(Error::InvalidContext(format!(
                "trace id must be 32 hex chars, got `{}`",
                trace_id
            )));
        }
        if !is_valid_span_id(&span_id) {
            return Err(Error::InvalidContext(format!(
                "span id must be 16 hex chars, got `{}`",
                span_id
            )));
        }

        Ok(Self {
            trace_id,
            span_id,
            parent_span_id: None,
            sampled: true,
        })
    }

    /// Set the parent span id.
    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    /// Output lines consumed by a later invocation that will open children
    /// under this span: the span id is exposed as the parent id.
    pub fn to_parent_lines(&self) -> String {
        format!("trace_id={}\nparent_span_id={}", self.trace_id, self.span_id)
    }

    /// Output lines consumed by the invocation that will close this span.
    pub fn to_span_lines(&self) -> String {
        format!("trace_id={}\nspan_id={}", self.trace_id, self.span_id)
    }

    /// Create from a W3C traceparent header value.
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let parts: Vec<&str> = header.split('-').collect();
        if parts.len() < 4 {
            return None;
        }

        if parts[0] != "00" {
            return None; // Unsupported version
        }

        let mut ctx = Self::new(parts[1], parts[2]).ok()?;
        ctx.sampled = parts[3].ends_with('1');
        Some(ctx)
    }

    /// Convert to a W3C traceparent header value.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{}", self.trace_id, self.span_id, flags)
    }
}

/// Re-hydrate a trace context for a command that requires one.
///
/// Explicit CLI identifiers win; the hand-off record is only consulted when
/// both identifiers are absent. Missing identifiers yield a typed error
/// naming the command and the absent flags, never a panic, and are reported
/// before any exporter or HTTP client is constructed.
pub fn decode(
    command: &str,
    trace_id: Option<String>,
    span_id: Option<String>,
    span_flag: &str,
    fallback: Option<&HandoffRecord>,
) -> Result<TraceContext> {
    match (trace_id, span_id) {
        (Some(trace_id), Some(span_id)) => TraceContext::new(trace_id, span_id),
        (trace_id, span_id) => {
            if let Some(record) = fallback {
                return Ok(record.context());
            }
            let mut missing = Vec::new();
            if trace_id.is_none() {
                missing.push("--trace-id".to_string());
            }
            if span_id.is_none() {
                missing.push(format!("--{}", span_flag));
            }
            Err(Error::missing_context(command, &missing.join(", ")))
        }
    }
}

/// Whether a string is a valid 128-bit trace id (32 lowercase hex chars).
pub fn is_valid_trace_id(s: &str) -> bool {
    s.len() == 32 && is_lower_hex(s) && s.bytes().any(|b| b != b'0')
}

/// Whether a string is a valid 64-bit span id (16 lowercase hex chars).
pub fn is_valid_span_id(s: &str) -> bool {
    s.len() == 16 && is_lower_hex(s) && s.bytes().any(|b| b != b'0')
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    #[test]
    fn test_new_validates_hex_shape() {
        assert!(TraceContext::new(TRACE_ID, SPAN_ID).is_ok());
        assert!(TraceContext::new("not-hex", SPAN_ID).is_err());
        assert!(TraceContext::new(TRACE_ID, "deadbeef").is_err());
        assert!(TraceContext::new(&TRACE_ID.to_uppercase(), SPAN_ID).is_err());
        // All-zero ids are invalid per the W3C trace context rules.
        assert!(TraceContext::new("0".repeat(32), SPAN_ID).is_err());
        assert!(TraceContext::new(TRACE_ID, "0".repeat(16)).is_err());
    }

    #[test]
    fn test_traceparent_roundtrip() {
        let ctx = TraceContext::new(TRACE_ID, SPAN_ID).unwrap();

        let header = ctx.to_traceparent();
        assert_eq!(
            header,
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );

        let parsed = TraceContext::from_traceparent(&header).unwrap();
        assert_eq!(parsed, ctx);
    }

    #[test]
    fn test_traceparent_rejects_unknown_version() {
        assert!(TraceContext::from_traceparent("ff-abc-def-01").is_none());
        assert!(TraceContext::from_traceparent("garbage").is_none());
    }

    #[test]
    fn test_output_lines() {
        let ctx = TraceContext::new(TRACE_ID, SPAN_ID).unwrap();
        assert_eq!(
            ctx.to_parent_lines(),
            format!("trace_id={}\nparent_span_id={}", TRACE_ID, SPAN_ID)
        );
        assert_eq!(
            ctx.to_span_lines(),
            format!("trace_id={}\nspan_id={}", TRACE_ID, SPAN_ID)
        );
    }

    #[test]
    fn test_decode_prefers_explicit_arguments() {
        let stale = HandoffRecord::new(
            "Build",
            TraceContext::new(&"1".repeat(32), &"2".repeat(16)).unwrap(),
            Utc::now(),
        );

        let ctx = decode(
            "end-child",
            Some(TRACE_ID.to_string()),
            Some(SPAN_ID.to_string()),
            "span-id",
            Some(&stale),
        )
        .unwrap();

        assert_eq!(ctx.trace_id, TRACE_ID);
        assert_eq!(ctx.span_id, SPAN_ID);
    }

    #[test]
    fn test_decode_falls_back_to_handoff_record() {
        let record = HandoffRecord::new(
            "Build",
            TraceContext::new(TRACE_ID, SPAN_ID).unwrap(),
            Utc::now(),
        );

        let ctx = decode("end", None, None, "parent-span-id", Some(&record)).unwrap();
        assert_eq!(ctx.trace_id, TRACE_ID);
        assert_eq!(ctx.span_id, SPAN_ID);
    }

    #[test]
    fn test_decode_missing_everything_names_the_flags() {
        let err = decode("end-child", None, None, "span-id", None).unwrap_err();
        match err {
            Error::MissingContext { command, missing } => {
                assert_eq!(command, "end-child");
                assert!(missing.contains("--trace-id"));
                assert!(missing.contains("--span-id"));
            }
            other => panic!("expected MissingContext, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_partial_arguments_are_missing_context() {
        let err = decode(
            "start-child",
            None,
            Some(SPAN_ID.to_string()),
            "parent-span-id",
            None,
        )
        .unwrap_err();
        match err {
            Error::MissingContext { missing, .. } => {
                assert!(missing.contains("--trace-id"));
                assert!(!missing.contains("--parent-span-id"));
            }
            other => panic!("expected MissingContext, got {other:?}"),
        }
    }
}
