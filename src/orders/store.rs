//! Concurrent in-memory order repository.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::types::{normalize_quantity, NewOrder, Order, DEFAULT_ITEM, DEFAULT_STATUS};

/// Orders seeded at startup so the read endpoints have data.
const DEMO_ITEMS: [&str; 3] = ["widget-pro", "widget-lite", "sensor-kit"];

struct Entry {
    seq: u64,
    order: Order,
}

/// Thread-safe order store.
///
/// Records are built completely before insertion, so readers never see a
/// partially initialized order. Each record carries an insertion sequence
/// number that gives `list` a stable order.
#[derive(Default)]
pub struct OrderStore {
    orders: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl OrderStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the demo orders.
    pub fn with_demo_orders() -> Self {
        let store = Self::new();
        store.seed_demo_orders();
        store
    }

    /// Insert `demo-1`..`demo-3` with quantities 1..3.
    pub fn seed_demo_orders(&self) {
        for (index, item) in DEMO_ITEMS.iter().enumerate() {
            let n = index + 1;
            self.create(NewOrder::new(*item, n as i64).with_id(format!("demo-{}", n)));
        }
        tracing::debug!(count = DEMO_ITEMS.len(), "Seeded demo orders");
    }

    /// Create and insert a new order, returning a copy of it.
    ///
    /// A missing id is replaced by a fresh UUID v4. A supplied id that is
    /// already present replaces the earlier record.
    pub fn create(&self, payload: NewOrder) -> Order {
        let id = payload
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let order = Order {
            id: id.clone(),
            item: payload
                .item
                .filter(|item| !item.is_empty())
                .unwrap_or_else(|| DEFAULT_ITEM.to_string()),
            quantity: normalize_quantity(payload.quantity),
            status: payload
                .status
                .filter(|status| !status.is_empty())
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            created_at: Utc::now(),
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.orders.insert(id, Entry { seq, order: order.clone() });
        order
    }

    /// Look up an order by id.
    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.get(id).map(|entry| entry.order.clone())
    }

    /// Snapshot of all orders in insertion order.
    pub fn list(&self) -> Vec<Order> {
        let mut entries: Vec<(u64, Order)> = self
            .orders
            .iter()
            .map(|r| (r.value().seq, r.value().order.clone()))
            .collect();
        entries.sort_unstable_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, order)| order).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
