//! Order storage subsystem.
//!
//! # Data Flow
//! ```text
//! POST /orders
//!     → handler validates + coerces JSON (types.rs helpers)
//!     → store.rs create (id generation, defaults, insert)
//!
//! GET /orders, GET /orders/{id}
//!     → store.rs list / get (cloned snapshots)
//! ```
//!
//! # Design Decisions
//! - In-memory only; records live for the process lifetime
//! - Store instance is passed through application state, never global

pub mod store;
pub mod types;

pub use store::OrderStore;
pub use types::{NewOrder, Order};
