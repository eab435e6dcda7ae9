//! Order record types and input coercion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Item name used when an order is created without one.
pub const DEFAULT_ITEM: &str = "widget";

/// Status assigned to orders created without one.
pub const DEFAULT_STATUS: &str = "processed";

/// A stored order. `id` and `created_at` never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub item: String,
    pub quantity: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Input accepted by [`OrderStore::create`](super::store::OrderStore::create).
///
/// Every field is optional; the store fills in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    pub id: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub status: Option<String>,
}

impl NewOrder {
    pub fn new(item: impl Into<String>, quantity: i64) -> Self {
        Self {
            item: Some(item.into()),
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Clamp a requested quantity to a positive integer, falling back to 1.
pub fn normalize_quantity(quantity: Option<i64>) -> u32 {
    match quantity {
        Some(q) if q >= 1 => u32::try_from(q).unwrap_or(u32::MAX),
        _ => 1,
    }
}

/// Loose truthiness of a JSON value: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Coerce a JSON quantity (number or numeric string) to an integer.
///
/// Fractions are truncated toward zero. Returns `None` for anything that is
/// not numeric.
pub fn coerce_quantity(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(true) => 1.0,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.trunc() as i64)
}

/// Render a JSON item value as an item name. Strings are taken verbatim.
pub fn coerce_item(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
