//! Hand-off file: trace context persisted between process invocations.
//!
//! The file is a JSON stack of records. `start`/`start-child` push, the
//! matching `end-child`/`end` pops, and the root `end` removes the file so
//! stale context never leaks into an unrelated later job. Steps within one
//! job run strictly sequentially, so there is no concurrent access.

use crate::context::TraceContext;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "stitch-handoff.json";

/// One pushed context, plus the step that opened it and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub step: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub sampled: bool,
    pub started_at: DateTime<Utc>,
}

impl HandoffRecord {
    pub fn new(step: impl Into<String>, ctx: TraceContext, started_at: DateTime<Utc>) -> Self {
        Self {
            step: step.into(),
            trace_id: ctx.trace_id,
            span_id: ctx.span_id,
            parent_span_id: ctx.parent_span_id,
            sampled: ctx.sampled,
            started_at,
        }
    }

    /// Rebuild the trace context this record carries.
    pub fn context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            sampled: self.sampled,
        }
    }
}

/// The on-disk hand-off stack.
pub struct HandoffFile {
    path: PathBuf,
}

impl HandoffFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default well-known location, overridable via `STITCH_HANDOFF_FILE`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("STITCH_HANDOFF_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Push a record onto the stack, creating the file if needed.
    pub fn push(&self, record: HandoffRecord) -> Result<()> {
        let mut stack = self.load()?;
        stack.push(record);
        let content = serde_json::to_string_pretty(&stack)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Pop the most recently pushed record.
    ///
    /// An absent or empty file is not an error here: the caller decides
    /// whether a missing context is fatal for its command.
    pub fn pop(&self) -> Result<Option<HandoffRecord>> {
        let mut stack = self.load()?;
        let record = stack.pop();
        if record.is_some() {
            if stack.is_empty() {
                self.clear()?;
            } else {
                let content = serde_json::to_string_pretty(&stack)?;
                std::fs::write(&self.path, content)?;
            }
        }
        Ok(record)
    }

    /// Read the top of the stack without consuming it.
    pub fn peek(&self) -> Result<Option<HandoffRecord>> {
        Ok(self.load()?.pop())
    }

    /// Remove the file. Called when the root span's `end` completes.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Result<Vec<HandoffRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record(step: &str, span_id: &str) -> HandoffRecord {
        let ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", span_id).unwrap();
        HandoffRecord::new(step, ctx, Utc::now())
    }

    #[test]
    fn test_pop_on_absent_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = HandoffFile::new(dir.path().join("handoff.json"));
        assert!(file.pop().unwrap().is_none());
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = HandoffFile::new(dir.path().join("handoff.json"));

        let record = sample_record("Build", "00f067aa0ba902b7");
        file.push(record.clone()).unwrap();

        let popped = file.pop().unwrap().unwrap();
        assert_eq!(popped, record);
        assert_eq!(popped.context().trace_id, record.trace_id);

        // Stack drained, file gone.
        assert!(!file.path().exists());
    }

    #[test]
    fn test_stack_order_is_last_in_first_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = HandoffFile::new(dir.path().join("handoff.json"));

        file.push(sample_record("Build", "00f067aa0ba902b7")).unwrap();
        file.push(sample_record("Deploy", "11f067aa0ba902b7")).unwrap();

        assert_eq!(file.pop().unwrap().unwrap().step, "Deploy");
        assert_eq!(file.pop().unwrap().unwrap().step, "Build");
        assert!(file.pop().unwrap().is_none());
    }

    #[test]
    fn test_clear_tolerates_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = HandoffFile::new(dir.path().join("handoff.json"));
        file.clear().unwrap();
        file.push(sample_record("Build", "00f067aa0ba902b7")).unwrap();
        file.clear().unwrap();
        assert!(!file.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.json");
        std::fs::write(&path, "not json").unwrap();

        let file = HandoffFile::new(&path);
        assert!(file.pop().is_err());
    }
}
