//! Step records: the terminal output of a closed span.

use crate::context::TraceContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a CI step, as reported by the orchestrator.
///
/// The status is driven strictly by the orchestrator-supplied outcome (or the
/// wrapped command's exit code), never inferred from trace export success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "success" => Ok(StepStatus::Success),
            "failure" | "failed" => Ok(StepStatus::Failure),
            other => Err(format!("unknown step status: {}", other)),
        }
    }
}

/// One finished (or still-open) step. Created when a step starts, completed
/// when it ends, emitted exactly once per `end`/`end-child` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl StepRecord {
    /// Open a record for a step that has just started.
    pub fn open(step: impl Into<String>, ctx: &TraceContext, started_at: DateTime<Utc>) -> Self {
        Self {
            step: step.into(),
            trace_id: ctx.trace_id.clone(),
            span_id: ctx.span_id.clone(),
            parent_span_id: ctx.parent_span_id.clone(),
            started_at,
            ended_at: None,
            status: StepStatus::Pending,
            error: None,
            duration_ms: None,
        }
    }

    /// Complete the record with the step's outcome.
    pub fn complete(
        mut self,
        ended_at: DateTime<Utc>,
        status: StepStatus,
        error: Option<String>,
    ) -> Self {
        self.duration_ms = Some((ended_at - self.started_at).num_milliseconds().max(0));
        self.ended_at = Some(ended_at);
        self.status = status;
        self.error = error;
        self
    }
}

/// Job-level metadata passed through opaquely from the CI environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
}

impl JobMetadata {
    /// Read pass-through metadata from the CI environment. GitHub Actions
    /// names are tried first, then the generic `CI_*` fallbacks.
    pub fn from_env() -> Self {
        fn either(primary: &str, fallback: &str) -> Option<String> {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .ok()
                .filter(|v| !v.is_empty())
        }

        Self {
            repository: either("GITHUB_REPOSITORY", "CI_REPOSITORY"),
            commit_sha: either("GITHUB_SHA", "CI_COMMIT_SHA"),
            run_id: either("GITHUB_RUN_ID", "CI_RUN_ID"),
            workflow: either("GITHUB_WORKFLOW", "CI_WORKFLOW"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_step_record_lifecycle() {
        let ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7")
            .unwrap()
            .with_parent("11f067aa0ba902b7");
        let started = Utc::now();

        let record = StepRecord::open("Build", &ctx, started);
        assert_eq!(record.status, StepStatus::Pending);
        assert!(record.ended_at.is_none());

        let record = record.complete(
            started + TimeDelta::milliseconds(1500),
            StepStatus::Failure,
            Some("exit code 2".to_string()),
        );
        assert_eq!(record.status, StepStatus::Failure);
        assert_eq!(record.duration_ms, Some(1500));
        assert_eq!(record.parent_span_id.as_deref(), Some("11f067aa0ba902b7"));
    }

    #[test]
    fn test_negative_durations_clamp_to_zero() {
        let ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7").unwrap();
        let started = Utc::now();
        let record =
            StepRecord::open("Build", &ctx, started).complete(started - TimeDelta::seconds(1), StepStatus::Success, None);
        assert_eq!(record.duration_ms, Some(0));
    }

    #[test]
    fn test_status_parses_orchestrator_spellings() {
        assert_eq!("success".parse::<StepStatus>().unwrap(), StepStatus::Success);
        assert_eq!("failed".parse::<StepStatus>().unwrap(), StepStatus::Failure);
        assert!("flaky".parse::<StepStatus>().is_err());
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7").unwrap();
        let record = StepRecord::open("Build", &ctx, Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("parent_span_id"));
        assert!(!json.contains("error"));
        assert!(json.contains("\"status\":\"pending\""));
    }
}
