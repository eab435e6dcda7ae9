//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use order_service::config::ServiceConfig;
use order_service::http::{AppState, HttpServer};
use order_service::lifecycle::Shutdown;
use order_service::observability::Telemetry;
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Signal shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Default test configuration: no simulated delay.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.chaos.delay_scale = 0.0;
    config
}

/// Start the service on `127.0.0.1:0`.
pub async fn start_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let state = server.state().clone();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        state,
        shutdown,
        handle,
    }
}

/// Turn request spans into OpenTelemetry spans on the current thread.
///
/// `#[tokio::test]` runs the server on the test thread, so the guard covers it.
#[allow(dead_code)]
pub fn trace_requests(config: &ServiceConfig) -> (Telemetry, DefaultGuard) {
    let telemetry = Telemetry::in_process(&config.observability);
    let subscriber = tracing_subscriber::registry().with(telemetry.layer::<Registry>());
    let guard = tracing::subscriber::set_default(subscriber);
    (telemetry, guard)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Sum every sample of `metric` whose label set contains all of `filters`.
#[allow(dead_code)]
pub fn sum_series(text: &str, metric: &str, filters: &[&str]) -> f64 {
    text.lines()
        .filter(|line| line.starts_with(&format!("{}{{", metric)))
        .filter(|line| filters.iter().all(|f| line.contains(f)))
        .filter_map(|line| line.rsplit(' ').next()?.parse::<f64>().ok())
        .sum()
}
