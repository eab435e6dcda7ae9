//! Per-request instrumentation.
//!
//! # Stages
//! ```text
//! Received
//!     → trace context lookup, request span opened (Logged/Traced)
//!     → latency timer started (Timed)
//!     → handler runs inside the span (Handled)
//!     → Succeeded | Failed (AppError translated to JSON by error.rs)
//!     → counter, histogram, error counter (MetricsRecorded)
//!     → failure log + access log, traceparent header (ResponseSent)
//! ```
//!
//! # Design Decisions
//! - Metric labels are method/route/status only; trace ids go to logs
//! - Route label prefers the matched template so raw ids never become labels
//! - Each failure is logged exactly once, here, with the request labels

use axum::{
    extract::{MatchedPath, Request, State},
    http::Uri,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level};

use crate::http::error::AppError;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::logging::access_log_level;
use crate::observability::metrics::RequestLabels;

/// Route label used when neither a template nor a path is available.
pub const UNKNOWN_ROUTE: &str = "unknown";

/// Pick the route label: matched template, else the path without its query
/// string, else `"unknown"`.
pub fn resolve_route(matched: Option<&str>, uri: &Uri) -> String {
    if let Some(template) = matched.filter(|t| !t.is_empty()) {
        return template.to_string();
    }
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");
    if path.is_empty() {
        UNKNOWN_ROUTE.to_string()
    } else {
        path.to_string()
    }
}

macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if $level == Level::WARN {
            tracing::warn!($($arg)+)
        } else {
            tracing::info!($($arg)+)
        }
    };
}

/// Middleware wrapping every route with tracing, logging and metrics.
pub async fn request_pipeline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let route = resolve_route(
        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str),
        request.uri(),
    );
    let request_id = request_id(request.headers());

    let span = tracing::info_span!(
        "request",
        otel.name = %format!("{} {}", method, route),
        otel.kind = "server",
        otel.status_code = tracing::field::Empty,
        service = %state.identity.name,
        environment = %state.identity.environment,
        version = %state.identity.version,
        request_id = %request_id,
        method = %method,
        route = %route,
        status = tracing::field::Empty,
        trace_id = tracing::field::Empty,
        span_id = tracing::field::Empty,
    );
    state.trace.attach(&span, request.headers());
    let span_ctx = state.trace.span_context(&span);
    let trace_id = span_ctx.as_ref().map(|c| c.trace_id().to_string());
    let span_id = span_ctx.as_ref().map(|c| c.span_id().to_string());
    if let (Some(trace_id), Some(span_id)) = (&trace_id, &span_id) {
        span.record("trace_id", trace_id.as_str());
        span.record("span_id", span_id.as_str());
    }

    let timer = state.metrics.start_timer();
    let mut response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    span.record("status", status);
    if status >= 500 {
        span.record("otel.status_code", "ERROR");
    }
    let labels = RequestLabels::new(method.as_str(), route.as_str(), status);
    state.metrics.record_request(&labels);
    let elapsed = timer.observe(&labels);
    if status >= 500 {
        state.metrics.record_error(&labels);
    }

    let failure = response.extensions().get::<AppError>().cloned();
    span.in_scope(|| {
        if let Some(err) = &failure {
            tracing::error!(
                error = %err,
                kind = err.kind(),
                status,
                method = %labels.method,
                route = %labels.route,
                "request failed"
            );
        }

        let level = access_log_level(status);
        event_at!(
            level,
            method = %method,
            path = %path,
            route = %route,
            status,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            request_id = %request_id,
            trace_id = trace_id.as_deref(),
            span_id = span_id.as_deref(),
            "request completed"
        );
    });

    state.trace.inject(&span, response.headers_mut());
    response
}
