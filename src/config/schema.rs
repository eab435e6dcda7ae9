//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the order service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Logging, tracing and service identity.
    pub observability: ObservabilityConfig,

    /// Simulated work settings.
    pub chaos: ChaosConfig,

    /// Order store settings.
    pub store: StoreConfig,

    /// Request limits.
    pub limits: LimitsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listen port.
    pub port: u16,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Service name, used as the `service` metric label and log field.
    pub service_name: String,

    /// Deployment environment (development, staging, production).
    pub environment: String,

    /// Service version reported in logs.
    pub service_version: String,

    /// Trace export endpoint (OTLP/HTTP).
    pub otlp_endpoint: String,

    /// Attach trace context to requests and logs.
    pub tracing_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            service_name: "order-service".to_string(),
            environment: "development".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: "http://localhost:4318/v1/traces".to_string(),
            tracing_enabled: true,
        }
    }
}

/// Simulated work configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChaosConfig {
    /// Multiplier applied to the millisecond time unit (0 disables delays).
    pub delay_scale: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self { delay_scale: 1.0 }
    }
}

/// Order store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Insert demo-1..demo-3 at startup.
    pub seed_demo_orders: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_demo_orders: true,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 100 * 1024, // 100 KiB
        }
    }
}
