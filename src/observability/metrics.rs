//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_request_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_request_errors_total` (counter): responses with status >= 500
//! - `process_*` (gauges/counters): CPU, memory, open file descriptors and
//!   threads of this process, sampled at scrape time
//!
//! # Design Decisions
//! - One Prometheus recorder per registry instance, never installed globally,
//!   so several registries can coexist in a process
//! - Labels restricted to method/route/status to keep cardinality bounded
//! - Histogram buckets tuned for 50ms..5s request latencies

use std::time::{Duration, Instant};

use metrics::Label;
use metrics_process::Collector;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

pub const REQUESTS_TOTAL: &str = "http_request_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const REQUEST_ERRORS_TOTAL: &str = "http_request_errors_total";

/// Latency bucket boundaries in seconds.
pub const DURATION_BUCKETS: [f64; 8] = [0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.0, 5.0];

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to build Prometheus recorder: {0}")]
    Build(#[from] BuildError),
}

/// The `(method, route, status)` label triple shared by every instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestLabels {
    pub method: String,
    pub route: String,
    pub status: String,
}

impl RequestLabels {
    pub fn new(method: impl Into<String>, route: impl Into<String>, status: u16) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            status: status.to_string(),
        }
    }

    fn to_labels(&self) -> Vec<Label> {
        vec![
            Label::new("method", self.method.clone()),
            Label::new("route", self.route.clone()),
            Label::new("status", self.status.clone()),
        ]
    }
}

/// Request metrics backed by a private Prometheus recorder.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    process: Collector,
}

impl MetricsRegistry {
    /// Build a registry whose series all carry `service=<service_name>`.
    pub fn new(service_name: &str) -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
                &DURATION_BUCKETS,
            )?
            .add_global_label("service", service_name)
            .build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests");
            metrics::describe_histogram!(
                REQUEST_DURATION_SECONDS,
                metrics::Unit::Seconds,
                "Request latency histogram"
            );
            metrics::describe_counter!(REQUEST_ERRORS_TOTAL, "Total number of error responses");
        });

        let process = Collector::default();
        metrics::with_local_recorder(&recorder, || process.describe());

        Ok(Self {
            recorder,
            handle,
            process,
        })
    }

    /// Increment the request counter.
    pub fn record_request(&self, labels: &RequestLabels) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(REQUESTS_TOTAL, labels.to_labels()).increment(1);
        });
    }

    /// Increment the error counter. Callers only invoke this for status >= 500.
    pub fn record_error(&self, labels: &RequestLabels) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(REQUEST_ERRORS_TOTAL, labels.to_labels()).increment(1);
        });
    }

    /// Record an observed request latency.
    pub fn observe_duration(&self, labels: &RequestLabels, elapsed: Duration) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::histogram!(REQUEST_DURATION_SECONDS, labels.to_labels())
                .record(elapsed.as_secs_f64());
        });
    }

    /// Begin a latency measurement.
    pub fn start_timer(&self) -> RequestTimer<'_> {
        RequestTimer {
            registry: self,
            started: Instant::now(),
        }
    }

    /// Render all instruments in the Prometheus text format.
    ///
    /// Process gauges are sampled first; request series are only read.
    pub fn render(&self) -> String {
        metrics::with_local_recorder(&self.recorder, || self.process.collect());
        self.handle.render()
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

/// Running latency measurement; stopping it consumes the timer.
pub struct RequestTimer<'a> {
    registry: &'a MetricsRegistry,
    started: Instant,
}

impl RequestTimer<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the timer and record the elapsed time under `labels`.
    pub fn observe(self, labels: &RequestLabels) -> Duration {
        let elapsed = self.started.elapsed();
        self.registry.observe_duration(labels, elapsed);
        elapsed
    }
}
