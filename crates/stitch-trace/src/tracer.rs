//! Tracer pipeline construction and shutdown.
//!
//! No module-level globals: each invocation builds one `TracePipeline`,
//! threads it through the handlers, and shuts it down before exiting. The
//! explicit shutdown matters because every invocation is a short-lived
//! process; without a final flush the exported span would be dropped.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stitch_core::JobMetadata;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Failed to initialize tracer: {0}")]
    Init(String),
    #[error("Failed to export traces: {0}")]
    Export(String),
}

/// OTLP exporter configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub headers: HashMap<String, String>,
}

impl ExporterConfig {
    /// Build from `STITCH_OTLP_ENDPOINT` / `STITCH_OTLP_TOKEN`. Returns
    /// `None` when no endpoint is configured, which disables export.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("STITCH_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            endpoint,
            api_token: std::env::var("STITCH_OTLP_TOKEN")
                .ok()
                .filter(|v| !v.is_empty()),
            timeout_seconds: 10,
            headers: HashMap::new(),
        })
    }
}

/// One process invocation's tracing pipeline.
pub struct TracePipeline {
    inner: Option<PipelineInner>,
}

pub(crate) struct PipelineInner {
    provider: TracerProvider,
    pub(crate) tracer: Tracer,
}

impl TracePipeline {
    /// A pipeline that records nothing. Used when no exporter endpoint is
    /// configured and by commands that must not touch the network.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build an OTLP pipeline over HTTP, batching on the Tokio runtime.
    pub fn otlp(config: &ExporterConfig, metadata: &JobMetadata) -> Result<Self, TracerError> {
        let mut headers = config.headers.clone();
        if let Some(token) = &config.api_token {
            headers.insert("authorization".to_string(), format!("Bearer {}", token));
        }

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(&config.endpoint)
            .with_headers(headers)
            .with_timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TracerError::Init(e.to_string()))?;

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(build_resource(metadata))
            .build();

        Ok(Self::from_provider(provider))
    }

    /// Build a pipeline over an explicit span exporter with a synchronous
    /// (simple) processor. Tests use this with an in-memory exporter.
    pub fn with_span_exporter<E>(exporter: E, metadata: &JobMetadata) -> Self
    where
        E: opentelemetry_sdk::export::trace::SpanExporter + 'static,
    {
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(build_resource(metadata))
            .build();

        Self::from_provider(provider)
    }

    fn from_provider(provider: TracerProvider) -> Self {
        let tracer = provider.tracer("stitch");
        Self {
            inner: Some(PipelineInner { provider, tracer }),
        }
    }

    pub(crate) fn inner(&self) -> Option<&PipelineInner> {
        self.inner.as_ref()
    }

    /// Flush and shut down the provider. Export failures are logged and
    /// swallowed; tracing is a best-effort side channel.
    pub fn shutdown(&self) {
        if let Some(inner) = &self.inner {
            for result in inner.provider.force_flush() {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to flush spans before exit");
                }
            }
            if let Err(e) = inner.provider.shutdown() {
                warn!(error = %e, "Failed to shut down tracer provider");
            }
        }
    }
}

fn build_resource(metadata: &JobMetadata) -> Resource {
    let mut attrs = vec![
        KeyValue::new("service.name", "stitch"),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ];

    if let Some(repository) = &metadata.repository {
        attrs.push(KeyValue::new("vcs.repository", repository.clone()));
    }
    if let Some(sha) = &metadata.commit_sha {
        attrs.push(KeyValue::new("vcs.sha", sha.clone()));
    }
    if let Some(run_id) = &metadata.run_id {
        attrs.push(KeyValue::new("ci.run.id", run_id.clone()));
    }
    if let Some(workflow) = &metadata.workflow {
        attrs.push(KeyValue::new("ci.workflow.name", workflow.clone()));
    }

    Resource::new(attrs)
}
