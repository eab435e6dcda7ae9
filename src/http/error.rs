//! Request failure taxonomy and its translation into HTTP responses.
//!
//! # Responsibilities
//! - Give every handler failure a status code and message as first-class fields
//! - Convert failures into the uniform `{ "error", "status" }` JSON body
//! - Tag the translated response so the pipeline can log the failure once
//!
//! # Design Decisions
//! - Handlers return `Result<_, AppError>` and never build error bodies
//! - The error travels in the response extensions; logging happens in the
//!   pipeline where the request span and labels are available

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by route handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    /// Missing or malformed input; raised before any store or chaos call.
    #[error("{0}")]
    Validation(String),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Deliberate chaos-mode failure. Transient, callers may retry.
    #[error("Injected chaos failure")]
    InjectedFailure,

    /// The path exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Random simulated processing fault.
    #[error("Random order processing error")]
    Processing,

    /// The request body extractor refused the body (size limit, read error).
    #[error("{message}")]
    BodyRejected { status: u16, message: String },

    /// Unexpected internal fault, including handler panics.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Status code declared by this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InjectedFailure => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Processing | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BodyRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Stable machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::InjectedFailure => "injected_failure",
            AppError::Processing => "processing",
            AppError::BodyRejected { .. } => "body_rejected",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Uniform error body shared by every failing response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Translate a handler panic into the same JSON failure shape.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    AppError::Internal("Internal server error".into()).into_response()
}
