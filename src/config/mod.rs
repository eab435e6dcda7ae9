//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs, --config)
//!     → environment overrides (loader.rs: PORT, LOG_LEVEL, OTEL_*, ...)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ChaosConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServiceConfig,
    StoreConfig,
};
