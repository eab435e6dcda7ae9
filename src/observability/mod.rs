//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured access log events)
//!     → metrics.rs (counters, histogram)
//!     → tracing.rs (W3C propagation, trace/span ids for correlation)
//!     → telemetry.rs (request spans exported as OpenTelemetry spans)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → GET /metrics (Prometheus scrape)
//!     → Trace backends, via OTLP/HTTP
//! ```
//!
//! # Design Decisions
//! - Request ID and trace ids flow through the request span
//! - Metrics are cheap (atomic increments)
//! - Tracing can be disabled without touching the pipeline

pub mod logging;
pub mod metrics;
pub mod telemetry;
pub mod tracing;

pub use self::metrics::{MetricsRegistry, RequestLabels};
pub use self::telemetry::{Telemetry, TelemetryError};
pub use self::tracing::TraceContextProvider;
