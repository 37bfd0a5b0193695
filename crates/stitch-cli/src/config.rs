//! Per-invocation configuration, read once from the environment and passed
//! down explicitly. Nothing here is global: every handler receives the same
//! config object and builds its own pipeline and emitter from it.

use std::path::PathBuf;
use stitch_core::{HandoffFile, JobMetadata};
use stitch_ingest::LogEmitter;
use stitch_trace::{ExporterConfig, TracePipeline};
use tracing::warn;

pub struct StitchConfig {
    /// OTLP exporter settings; `None` disables span export entirely.
    pub otlp: Option<ExporterConfig>,
    /// Log-ingestion endpoint; `None` disables log forwarding.
    pub log_endpoint: Option<String>,
    pub log_token: Option<String>,
    /// Hand-off file location for this job.
    pub handoff_path: PathBuf,
    /// Pass-through CI metadata.
    pub metadata: JobMetadata,
}

impl StitchConfig {
    pub fn from_env() -> Self {
        Self {
            otlp: ExporterConfig::from_env(),
            log_endpoint: std::env::var("STITCH_LOG_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
            log_token: std::env::var("STITCH_LOG_TOKEN")
                .ok()
                .filter(|v| !v.is_empty()),
            handoff_path: HandoffFile::default_path(),
            metadata: JobMetadata::from_env(),
        }
    }

    /// Build the tracing pipeline. An exporter that cannot be constructed
    /// degrades to a disabled pipeline: tracing failures must never fail the
    /// pipeline step itself.
    pub fn pipeline(&self) -> TracePipeline {
        match &self.otlp {
            Some(otlp) => TracePipeline::otlp(otlp, &self.metadata).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to initialize OTLP exporter, spans disabled");
                TracePipeline::disabled()
            }),
            None => TracePipeline::disabled(),
        }
    }

    pub fn emitter(&self) -> Option<LogEmitter> {
        self.log_endpoint
            .as_ref()
            .map(|endpoint| LogEmitter::new(endpoint, self.log_token.clone()))
    }

    pub fn handoff(&self) -> HandoffFile {
        HandoffFile::new(&self.handoff_path)
    }
}
