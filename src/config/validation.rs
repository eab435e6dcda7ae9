//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and enumerations
//! - Validate the trace export endpoint URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Largest accepted `chaos.delay_scale`; one unit is then one second.
pub const MAX_DELAY_SCALE: f64 = 1000.0;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not one of {}", obs.log_level, LOG_LEVELS.join(", ")),
        ));
    }
    if obs.service_name.trim().is_empty() {
        errors.push(ValidationError::new("observability.service_name", "must not be empty"));
    }
    match Url::parse(&obs.otlp_endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "observability.otlp_endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "observability.otlp_endpoint",
            format!("invalid URL: {}", e),
        )),
    }

    let scale = config.chaos.delay_scale;
    if !scale.is_finite() || !(0.0..=MAX_DELAY_SCALE).contains(&scale) {
        errors.push(ValidationError::new(
            "chaos.delay_scale",
            format!("must be a number between 0 and {}", MAX_DELAY_SCALE),
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
