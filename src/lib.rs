//! Instrumented demo order service.
//!
//! An HTTP service that stores orders in memory and exercises the full
//! observability stack around every request: trace correlation, structured
//! access logs, Prometheus request metrics and fault injection.

pub mod chaos;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orders;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
