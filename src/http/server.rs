//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from configuration
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, instrumentation pipeline, panic capture)
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};

use crate::chaos::ChaosSimulator;
use crate::config::{ObservabilityConfig, ServiceConfig};
use crate::http::error::panic_response;
use crate::http::handlers;
use crate::http::pipeline::request_pipeline;
use crate::lifecycle::shutdown;
use crate::observability::metrics::{MetricsError, MetricsRegistry};
use crate::observability::tracing::{NoopTraceContext, TraceContextProvider, W3cTraceContext};
use crate::orders::OrderStore;

/// Resource attributes identifying this service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub environment: String,
    pub version: String,
}

impl From<&ObservabilityConfig> for ServiceIdentity {
    fn from(config: &ObservabilityConfig) -> Self {
        Self {
            name: config.service_name.clone(),
            environment: config.environment.clone(),
            version: config.service_version.clone(),
        }
    }
}

/// Application state injected into handlers and the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OrderStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub chaos: ChaosSimulator,
    pub trace: Arc<dyn TraceContextProvider>,
    pub identity: Arc<ServiceIdentity>,
    pub started_at: Instant,
}

impl AppState {
    /// Build fresh state: a new store (seeded if configured) and registry.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, MetricsError> {
        let identity = ServiceIdentity::from(&config.observability);
        let metrics = MetricsRegistry::new(&identity.name)?;

        let store = if config.store.seed_demo_orders {
            OrderStore::with_demo_orders()
        } else {
            OrderStore::new()
        };

        let trace: Arc<dyn TraceContextProvider> = if config.observability.tracing_enabled {
            Arc::new(W3cTraceContext::default())
        } else {
            Arc::new(NoopTraceContext)
        };

        Ok(Self {
            store: Arc::new(store),
            metrics: Arc::new(metrics),
            chaos: ChaosSimulator::with_delay_scale(config.chaos.delay_scale),
            trace,
            identity: Arc::new(identity),
            started_at: Instant::now(),
        })
    }
}

/// HTTP server for the order service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, MetricsError> {
        let state = AppState::from_config(&config)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around existing state.
    pub fn with_state(config: ServiceConfig, state: AppState) -> Self {
        let router = build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Run the server until `shutdown_rx` fires. In-flight requests finish
    /// before this returns.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.state.identity.name,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layer order, outermost first: request ID assignment, request ID
/// propagation, instrumentation pipeline, panic capture.
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/orders/{id}", get(handlers::get_order))
        .route("/chaos", get(handlers::chaos))
        .route("/alert-debug", post(handlers::alert_debug))
        .fallback(handlers::route_not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn_with_state(state.clone(), request_pipeline))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Mutex;

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing::subscriber::DefaultGuard;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    use crate::http::{AppError, X_REQUEST_ID};
    use crate::observability::telemetry::Telemetry;
    use crate::observability::tracing::TRACEPARENT;

    #[derive(Debug, Clone)]
    struct LogRecord {
        level: Level,
        message: String,
        fields: HashMap<String, String>,
    }

    #[derive(Default)]
    struct RecordVisitor {
        message: String,
        fields: HashMap<String, String>,
    }

    impl Visit for RecordVisitor {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.fields.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            let value = format!("{:?}", value);
            if field.name() == "message" {
                self.message = value;
            } else {
                self.fields.insert(field.name().to_string(), value);
            }
        }
    }

    /// Keeps every event, and every span as opened, while installed.
    #[derive(Clone, Default)]
    struct CapturedLogs {
        events: Arc<Mutex<Vec<LogRecord>>>,
        spans: Arc<Mutex<Vec<LogRecord>>>,
    }

    impl<S: Subscriber> Layer<S> for CapturedLogs {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let mut visitor = RecordVisitor::default();
            attrs.record(&mut visitor);
            self.spans.lock().unwrap().push(LogRecord {
                level: *attrs.metadata().level(),
                message: attrs.metadata().name().to_string(),
                fields: visitor.fields,
            });
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = RecordVisitor::default();
            event.record(&mut visitor);
            self.events.lock().unwrap().push(LogRecord {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }

    impl CapturedLogs {
        fn take(&self) -> Vec<LogRecord> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn take_spans(&self) -> Vec<LogRecord> {
            std::mem::take(&mut *self.spans.lock().unwrap())
        }
    }

    /// Install span export and log capture on the current thread.
    fn capture_logs() -> (CapturedLogs, Telemetry, DefaultGuard) {
        let logs = CapturedLogs::default();
        let telemetry = Telemetry::in_process(&ServiceConfig::default().observability);
        let subscriber = tracing_subscriber::registry()
            .with(telemetry.layer::<Registry>())
            .with(logs.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, telemetry, guard)
    }

    fn named<'a>(records: &'a [LogRecord], message: &str) -> Vec<&'a LogRecord> {
        records.iter().filter(|r| r.message == message).collect()
    }

    fn test_server() -> HttpServer {
        let mut config = ServiceConfig::default();
        config.chaos.delay_scale = 0.0;
        HttpServer::new(config).unwrap()
    }

    async fn json_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() {
        let server = test_server();
        let response = server.router().oneshot(get("/orders/unknown-id")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await, json!({"error": "Order not found", "status": 404}));
    }

    #[tokio::test]
    async fn test_missing_quantity_is_400_without_store_write() {
        let server = test_server();
        let before = server.state().store.len();

        let response = server
            .router()
            .oneshot(post_json("/orders", json!({"item": "widget-pro"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_of(response).await,
            json!({"error": "item and quantity are required", "status": 400})
        );
        assert_eq!(server.state().store.len(), before);
    }

    #[tokio::test]
    async fn test_create_returns_order_or_processing_error() {
        let server = test_server();
        let response = server
            .router()
            .oneshot(post_json("/orders", json!({"item": "widget-pro", "quantity": 2})))
            .await
            .unwrap();

        match response.status() {
            StatusCode::CREATED => {
                let body = json_of(response).await;
                assert_eq!(body["data"]["item"], "widget-pro");
                assert_eq!(body["data"]["quantity"], 2);
                assert_eq!(body["data"]["status"], "processed");
                assert!(body.get("error").is_none());
                let id = body["data"]["id"].as_str().unwrap();
                assert!(server.state().store.get(id).is_some());
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                assert_eq!(
                    json_of(response).await,
                    json!({"error": "Random order processing error", "status": 500})
                );
            }
            other => panic!("unexpected status {}", other),
        }
    }

    #[tokio::test]
    async fn test_list_includes_seeded_orders() {
        let server = test_server();
        let response = server.router().oneshot(get("/orders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_of(response).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["id"], "demo-1");
        assert_eq!(data[0]["item"], "widget-pro");
        assert!(data[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_health_and_alert_debug() {
        let server = test_server();

        let response = server.router().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);

        let response = server
            .router()
            .oneshot(post_json("/alert-debug", json!({"alerts": [{"status": "firing"}]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_of(response).await, json!({"received": true}));
    }

    #[tokio::test]
    async fn test_request_id_and_traceparent_headers() {
        let (_logs, _telemetry, _guard) = capture_logs();
        let server = test_server();
        let request = Request::builder()
            .uri("/health")
            .header(X_REQUEST_ID, "req-42")
            .header(TRACEPARENT, "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .body(Body::empty())
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
        let traceparent = response.headers()[TRACEPARENT].to_str().unwrap();
        assert!(traceparent.starts_with("00-4bf92f3577b34da6a3ce929d0e0e4736-"));
        assert!(!traceparent.contains("00f067aa0ba902b7"));

        let response = server.router().oneshot(get("/health")).await.unwrap();
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_unmatched_route_uses_raw_path_label() {
        let server = test_server();
        let response = server
            .router()
            .oneshot(get("/does-not-exist?session=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await, json!({"error": "Route not found", "status": 404}));

        let text = server.state().metrics.render();
        assert!(text.contains("route=\"/does-not-exist\""));
        assert!(!text.contains("session=abc"));
    }

    #[tokio::test]
    async fn test_template_route_label() {
        let server = test_server();
        server.router().oneshot(get("/orders/demo-2")).await.unwrap();
        server.router().oneshot(get("/orders/demo-3")).await.unwrap();

        let text = server.state().metrics.render();
        assert!(text.contains("route=\"/orders/{id}\""));
        assert!(!text.contains("demo-2"));
    }

    #[tokio::test]
    async fn test_tracing_disabled_omits_traceparent() {
        let mut config = ServiceConfig::default();
        config.observability.tracing_enabled = false;
        let server = HttpServer::new(config).unwrap();

        let response = server.router().oneshot(get("/health")).await.unwrap();
        assert!(!response.headers().contains_key(TRACEPARENT));
    }

    #[tokio::test]
    async fn test_oversized_body_goes_through_error_stage() {
        let mut config = ServiceConfig::default();
        config.limits.max_body_bytes = 16;
        let server = HttpServer::new(config).unwrap();

        let response = server
            .router()
            .oneshot(post_json("/orders", json!({"item": "a-very-long-item-name", "quantity": 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_of(response).await["status"], 413);
    }

    #[tokio::test]
    async fn test_wrong_method_is_json_405() {
        let server = test_server();
        let request = Request::builder()
            .method("DELETE")
            .uri("/orders")
            .body(Body::empty())
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.extensions().get::<AppError>(),
            Some(&AppError::MethodNotAllowed)
        );
        assert_eq!(json_of(response).await, json!({"error": "Method not allowed", "status": 405}));

        let text = server.state().metrics.render();
        assert!(text.contains("method=\"DELETE\""));
        assert!(text.contains("status=\"405\""));
    }

    #[tokio::test]
    async fn test_access_log_severity_follows_status() {
        let (logs, _telemetry, _guard) = capture_logs();
        let server = test_server();

        server.router().oneshot(get("/health")).await.unwrap();
        server.router().oneshot(get("/orders/unknown-id")).await.unwrap();
        server
            .router()
            .oneshot(post_json("/orders", json!({"item": "widget-pro"})))
            .await
            .unwrap();

        let records = logs.take();
        let completed = named(&records, "request completed");
        let levels: Vec<(String, Level)> = completed
            .iter()
            .map(|r| (r.fields["status"].clone(), r.level))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("200".to_string(), Level::INFO),
                ("404".to_string(), Level::WARN),
                ("400".to_string(), Level::WARN),
            ]
        );
    }

    #[tokio::test]
    async fn test_each_failure_logged_once_at_error() {
        let (logs, _telemetry, _guard) = capture_logs();
        let server = test_server();

        server.router().oneshot(get("/orders/unknown-id")).await.unwrap();
        let records = logs.take();
        let failed = named(&records, "request failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].level, Level::ERROR);
        assert_eq!(failed[0].fields["kind"], "not_found");
        assert_eq!(failed[0].fields["route"], "/orders/{id}");

        // Chaos failures are random; keep going until one lands.
        let mut unavailable = 0;
        for _ in 0..200 {
            let response = server.router().oneshot(get("/chaos")).await.unwrap();
            if response.status() == StatusCode::SERVICE_UNAVAILABLE {
                unavailable += 1;
            }
        }
        assert!(unavailable > 0);

        let records = logs.take();
        let failed = named(&records, "request failed");
        assert_eq!(failed.len(), unavailable);
        assert!(failed.iter().all(|r| r.fields["kind"] == "injected_failure"));
        let errors = named(&records, "request completed")
            .into_iter()
            .filter(|r| r.level == Level::ERROR)
            .count();
        assert_eq!(errors, unavailable);
    }

    #[tokio::test]
    async fn test_access_log_carries_trace_ids() {
        let (logs, _telemetry, _guard) = capture_logs();
        let server = test_server();
        let request = Request::builder()
            .uri("/orders")
            .header(TRACEPARENT, "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
            .body(Body::empty())
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        let traceparent = response.headers()[TRACEPARENT].to_str().unwrap().to_string();

        let records = logs.take();
        let completed = named(&records, "request completed");
        assert_eq!(completed.len(), 1);
        let record = completed[0];
        assert_eq!(record.level, Level::INFO);
        assert_eq!(record.fields["trace_id"], "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(record.fields["span_id"].len(), 16);
        assert_ne!(record.fields["span_id"], "b7ad6b7169203331");
        assert_eq!(
            traceparent,
            format!("00-{}-{}-01", record.fields["trace_id"], record.fields["span_id"])
        );
    }

    #[tokio::test]
    async fn test_request_span_carries_service_identity() {
        let (logs, _telemetry, _guard) = capture_logs();
        let mut config = ServiceConfig::default();
        config.chaos.delay_scale = 0.0;
        config.observability.service_name = "orders-canary".into();
        config.observability.environment = "staging".into();
        config.observability.service_version = "2.3.4".into();
        let server = HttpServer::new(config).unwrap();

        server.router().oneshot(get("/health")).await.unwrap();

        let spans = logs.take_spans();
        let request = spans.iter().find(|s| s.message == "request").unwrap();
        assert_eq!(request.fields["service"], "orders-canary");
        assert_eq!(request.fields["environment"], "staging");
        assert_eq!(request.fields["version"], "2.3.4");
        assert_eq!(request.fields["route"], "/health");
    }
}
