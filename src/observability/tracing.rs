//! Distributed trace context for request spans.
//!
//! # Responsibilities
//! - Continue the caller's W3C trace context (`traceparent`) on the request span
//! - Expose trace/span ids to the access log and request span
//! - Write the active span's `traceparent` into responses
//!
//! # Design Decisions
//! - Trace ids never become metric labels
//! - Provider is a trait so tracing can be switched off without touching the pipeline
//! - Ids come from the OpenTelemetry span behind the `tracing` span, so logs and
//!   exported spans always agree

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// W3C trace context header name.
pub const TRACEPARENT: &str = "traceparent";

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Links request spans to distributed traces.
pub trait TraceContextProvider: Send + Sync {
    /// Make `span` a child of the trace carried in `headers`, if any.
    fn attach(&self, span: &Span, headers: &HeaderMap);

    /// Trace and span ids of `span`; `None` when it is not being traced.
    fn span_context(&self, span: &Span) -> Option<SpanContext>;

    /// Write the propagation headers for `span` into `headers`.
    fn inject(&self, span: &Span, headers: &mut HeaderMap);
}

/// W3C Trace Context propagation.
pub struct W3cTraceContext {
    propagator: TraceContextPropagator,
}

impl Default for W3cTraceContext {
    fn default() -> Self {
        Self {
            propagator: TraceContextPropagator::new(),
        }
    }
}

impl TraceContextProvider for W3cTraceContext {
    fn attach(&self, span: &Span, headers: &HeaderMap) {
        let parent = self.propagator.extract(&HeaderExtractor(headers));
        if parent.has_active_span() {
            span.set_parent(parent);
        }
    }

    fn span_context(&self, span: &Span) -> Option<SpanContext> {
        let cx = span.context();
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(span_context)
    }

    fn inject(&self, span: &Span, headers: &mut HeaderMap) {
        self.propagator
            .inject_context(&span.context(), &mut HeaderInjector(headers));
    }
}

/// Provider used when tracing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceContext;

impl TraceContextProvider for NoopTraceContext {
    fn attach(&self, _span: &Span, _headers: &HeaderMap) {}

    fn span_context(&self, _span: &Span) -> Option<SpanContext> {
        None
    }

    fn inject(&self, _span: &Span, _headers: &mut HeaderMap) {}
}
