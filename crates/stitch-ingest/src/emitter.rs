//! Log emitter implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stitch_core::{JobMetadata, StepRecord, StepStatus};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Ingestion endpoint rejected record ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// The wire format of one ingested record: the step record flattened
/// together with the job-level metadata and an emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub step: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub metadata: JobMetadata,
    pub timestamp: DateTime<Utc>,
}

impl LogPayload {
    pub fn new(record: &StepRecord, metadata: &JobMetadata) -> Self {
        Self {
            step: record.step.clone(),
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
            parent_span_id: record.parent_span_id.clone(),
            status: record.status,
            started_at: record.started_at,
            ended_at: record.ended_at,
            duration_ms: record.duration_ms,
            error: record.error.clone(),
            metadata: metadata.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Forwards finished step records to the log-ingestion endpoint.
pub struct LogEmitter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl LogEmitter {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Build from `STITCH_LOG_ENDPOINT` / `STITCH_LOG_TOKEN`. Returns `None`
    /// when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("STITCH_LOG_ENDPOINT")
            .ok()
            .filter(|v| !v.is_empty())?;
        let token = std::env::var("STITCH_LOG_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());
        Some(Self::new(endpoint, token))
    }

    /// POST one record. Single attempt; the caller decides whether a failed
    /// delivery is worth more than a warning (it never is, today).
    pub async fn emit(
        &self,
        record: &StepRecord,
        metadata: &JobMetadata,
    ) -> Result<(), IngestError> {
        debug!(endpoint = %self.endpoint, step = %record.step, "Emitting step record");

        let payload = LogPayload::new(record, metadata);
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Rejected { status, body });
        }

        info!(step = %record.step, status = %record.status.as_str(), "Step record ingested");
        Ok(())
    }
}
