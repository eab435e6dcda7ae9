//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Attach the OpenTelemetry span bridge when trace export is on
//! - Map outcomes to log severity
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level when present

use tracing::Level;
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::telemetry::Telemetry;

/// Build the default filter directive for a configured level.
pub fn default_directive(log_level: &str) -> String {
    format!("order_service={level},tower_http={level}", level = log_level)
}

/// Install the global tracing subscriber.
///
/// With `telemetry`, request spans are also exported as OpenTelemetry spans.
/// Returns an error if a subscriber is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
    telemetry: Option<&Telemetry>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let otel = telemetry.map(|t| t.layer::<Layered<EnvFilter, Registry>>());
    let registry = tracing_subscriber::registry().with(filter).with(otel);
    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Severity of the access log record for a finished request.
pub fn access_log_level(status: u16) -> Level {
    if status >= 500 {
        Level::ERROR
    } else if status >= 400 {
        Level::WARN
    } else {
        Level::INFO
    }
}
