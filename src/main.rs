//! Order service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                   ORDER SERVICE                     │
//!                    │                                                     │
//!   Client Request   │  ┌────────────┐   ┌────────────┐   ┌────────────┐   │
//!   ─────────────────┼─▶│ request-id │──▶│  pipeline  │──▶│  handlers  │   │
//!                    │  │   layers   │   │ trace/log/ │   │            │   │
//!                    │  └────────────┘   │  metrics   │   └─────┬──────┘   │
//!                    │                   └─────▲──────┘         │          │
//!                    │                         │         ┌──────┴──────┐   │
//!   Client Response  │                   ┌─────┴──────┐  │ OrderStore  │   │
//!   ◀────────────────┼───────────────────│ error.rs   │  │ ChaosSim    │   │
//!                    │                   │ JSON errors│  └─────────────┘   │
//!                    │                   └────────────┘                    │
//!                    └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use order_service::config::load_config;
use order_service::http::HttpServer;
use order_service::lifecycle::{signals, Shutdown};
use order_service::observability::logging::init_logging;
use order_service::observability::Telemetry;

#[derive(Parser)]
#[command(name = "order-service")]
#[command(about = "Instrumented demo order service", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "ORDER_SERVICE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let telemetry = if config.observability.tracing_enabled {
        // The OTLP exporter owns a blocking HTTP client; build it off the runtime.
        let obs = config.observability.clone();
        let telemetry = tokio::task::spawn_blocking(move || Telemetry::otlp(&obs)).await??;
        telemetry.install_global();
        Some(telemetry)
    } else {
        None
    };

    init_logging(&config.observability, telemetry.as_ref())?;

    let obs = &config.observability;
    tracing::info!(
        service = %obs.service_name,
        environment = %obs.environment,
        version = %obs.service_version,
        tracing_enabled = obs.tracing_enabled,
        otlp_endpoint = %obs.otlp_endpoint,
        "order-service starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        log_level = %obs.log_level,
        chaos_delay_scale = config.chaos.delay_scale,
        seed_demo_orders = config.store.seed_demo_orders,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config)?;
    tracing::info!(port = local_addr.port(), "order-service listening");
    server.run(listener, server_shutdown).await?;

    if let Some(telemetry) = telemetry {
        tracing::info!("Flushing pending trace exports");
        match tokio::task::spawn_blocking(move || telemetry.shutdown()).await? {
            Ok(()) => tracing::info!("Trace exporter flushed"),
            Err(e) => tracing::warn!(error = %e, "Trace exporter flush failed"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
