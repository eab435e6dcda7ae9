//! OpenTelemetry trace export.
//!
//! # Responsibilities
//! - Build the tracer provider carrying the service resource
//!   (`service.name`, `service.version`, `deployment.environment`)
//! - Export request spans over OTLP/HTTP to the configured collector
//! - Bridge `tracing` spans into OpenTelemetry spans
//! - Flush pending spans on shutdown
//!
//! # Design Decisions
//! - Spans are batched on the SDK's background thread, never on request tasks
//! - The provider is owned by `main`; handlers only see `tracing` spans

use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::ObservabilityConfig;

/// Instrumentation scope of the spans this service produces.
const TRACER_NAME: &str = "order-service";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(String),

    #[error("failed to flush pending spans: {0}")]
    Shutdown(String),
}

/// Resource attributes identifying this service instance.
pub fn service_resource(config: &ObservabilityConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build()
}

/// Owner of the process tracer provider.
#[derive(Clone)]
pub struct Telemetry {
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Provider exporting batched spans to `config.otlp_endpoint` over OTLP/HTTP.
    pub fn otlp(config: &ObservabilityConfig) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(config.otlp_endpoint.clone())
            .with_timeout(EXPORT_TIMEOUT)
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let provider = SdkTracerProvider::builder()
            .with_resource(service_resource(config))
            .with_batch_exporter(exporter)
            .build();

        Ok(Self { provider })
    }

    /// Provider that samples and correlates spans but exports nothing.
    pub fn in_process(config: &ObservabilityConfig) -> Self {
        let provider = SdkTracerProvider::builder()
            .with_resource(service_resource(config))
            .build();
        Self { provider }
    }

    /// Register the provider and the W3C propagator process-wide.
    pub fn install_global(&self) {
        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(self.provider.clone());
    }

    /// `tracing` layer turning spans into OpenTelemetry spans.
    pub fn layer<S>(&self) -> impl Layer<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.provider.tracer(TRACER_NAME))
    }

    /// Export everything still buffered and stop the exporter. Blocks.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        self.provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(e.to_string()))
    }
}
