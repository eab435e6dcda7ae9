//! Request handling helpers.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layers
//! - Decode JSON request bodies leniently
//!
//! # Design Decisions
//! - Request ID added as early as possible (outermost layer) for tracing
//! - A body that is empty or not declared as JSON reads as `{}`; handlers
//!   then apply their own field validation

use axum::{
    body::Bytes,
    extract::rejection::BytesRejection,
    http::{header, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use crate::http::error::AppError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID of the current request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// True for `application/json` and `application/*+json` media types.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Decode a request body as JSON.
pub fn read_json_body(
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Value, AppError> {
    let bytes = body.map_err(|rejection| AppError::BodyRejected {
        status: rejection.status().as_u16(),
        message: rejection.body_text(),
    })?;

    if bytes.is_empty() || !is_json_content_type(headers) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}
