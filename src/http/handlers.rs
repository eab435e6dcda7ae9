//! Route handlers.
//!
//! Handlers stay thin: they call the store or the chaos simulator and return
//! `AppError` on failure. Translation to JSON happens in `error.rs`.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::AppError;
use crate::http::request::read_json_body;
use crate::http::server::AppState;
use crate::orders::types::{coerce_item, coerce_quantity, is_truthy};
use crate::orders::{NewOrder, Order};

/// `{ "data": ... }` envelope used by the order endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChaosReport {
    pub chaos: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertReceipt {
    pub received: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, state.metrics.content_type())],
        state.metrics.render(),
    )
}

pub async fn list_orders(State(state): State<AppState>) -> Json<Data<Vec<Order>>> {
    Json(Data { data: state.store.list() })
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Data<Order>>, AppError> {
    state
        .store
        .get(&id)
        .map(|order| Json(Data { data: order }))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Data<Order>>), AppError> {
    let payload = read_json_body(&headers, body)?;
    let item = payload.get("item");
    let quantity = payload.get("quantity");

    if !is_truthy(item) || !is_truthy(quantity) {
        return Err(AppError::Validation("item and quantity are required".to_string()));
    }

    state.chaos.simulate_work(false).await?;

    let order = state.store.create(NewOrder {
        id: None,
        item: item.and_then(coerce_item),
        quantity: quantity.and_then(coerce_quantity),
        status: None,
    });
    tracing::debug!(order_id = %order.id, item = %order.item, quantity = order.quantity, "Order created");

    Ok((StatusCode::CREATED, Json(Data { data: order })))
}

pub async fn chaos(State(state): State<AppState>) -> Result<Json<ChaosReport>, AppError> {
    state.chaos.simulate_work(true).await?;
    Ok(Json(ChaosReport {
        chaos: true,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn alert_debug(
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<AlertReceipt>), AppError> {
    let alert: Value = read_json_body(&headers, body)?;
    tracing::warn!(alert = %alert, "received alert from Alertmanager");
    Ok((StatusCode::ACCEPTED, Json(AlertReceipt { received: true })))
}

pub async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
