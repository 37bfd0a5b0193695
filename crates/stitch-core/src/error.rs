//! Error types for Stitch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Context errors: the pipeline itself is wired up wrong.
    #[error("Missing trace context for `{command}`: {missing}")]
    MissingContext { command: String, missing: String },

    #[error("Invalid trace context: {0}")]
    InvalidContext(String),

    // Transport errors: observability side channel failed. Always recovered
    // locally by callers, never affects the process exit code.
    #[error("Export transport failed: {0}")]
    Transport(String),

    // The wrapped CI command failed. Propagated as the process exit code so
    // the CI job itself fails.
    #[error("Step failed with exit code {exit_code}: {message}")]
    StepFailed { exit_code: i32, message: String },

    #[error("Hand-off file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hand-off file is corrupt: {0}")]
    CorruptHandoff(#[from] serde_json::Error),
}

impl Error {
    /// Missing-context helper for a named command.
    pub fn missing_context(command: &str, missing: &str) -> Self {
        Self::MissingContext {
            command: command.to_string(),
            missing: missing.to_string(),
        }
    }

    /// The exit code this error maps to when it reaches the process boundary.
    ///
    /// Transport errors never reach the process boundary; they are logged and
    /// swallowed at the call site. The mapping here covers the errors that do.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StepFailed { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_context_exit_code() {
        let err = Error::missing_context("end-child", "--trace-id, --span-id");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("end-child"));
    }

    #[test]
    fn test_step_failed_propagates_exit_code() {
        let err = Error::StepFailed {
            exit_code: 42,
            message: "make: *** [build] Error 42".to_string(),
        };
        assert_eq!(err.exit_code(), 42);
    }
}
