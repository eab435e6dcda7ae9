//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay recognized environment variables onto `config`.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PORT") {
        config.listener.port = v.trim().parse().map_err(|_| ConfigError::Env { var: "PORT", value: v })?;
    }
    if let Some(v) = get("HOST") {
        config.listener.host = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.observability.log_level = v.to_ascii_lowercase();
    }
    if let Some(v) = get("LOG_FORMAT") {
        config.observability.log_format = v
            .parse()
            .map_err(|_| ConfigError::Env { var: "LOG_FORMAT", value: v })?;
    }
    if let Some(v) = get("OTEL_SERVICE_NAME") {
        config.observability.service_name = v;
    }
    if let Some(v) = get("DEPLOYMENT_ENVIRONMENT") {
        config.observability.environment = v;
    }
    if let Some(v) = get("SERVICE_VERSION") {
        config.observability.service_version = v;
    }
    if let Some(v) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.observability.otlp_endpoint = v;
    }
    if let Some(v) = get("TRACING_ENABLED") {
        config.observability.tracing_enabled = match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => return Err(ConfigError::Env { var: "TRACING_ENABLED", value: v }),
        };
    }
    if let Some(v) = get("CHAOS_DELAY_SCALE") {
        config.chaos.delay_scale = v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var: "CHAOS_DELAY_SCALE", value: v })?;
    }

    Ok(())
}
