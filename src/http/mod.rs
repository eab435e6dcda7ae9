//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request-id layers (x-request-id)
//!     → pipeline.rs (trace context, timer, access log, metrics)
//!     → handlers.rs (store / chaos calls)
//!     → error.rs (AppError → JSON error body)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod request;
pub mod server;

pub use error::{AppError, ErrorBody};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServiceIdentity};
