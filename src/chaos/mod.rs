//! Fault injection.
//!
//! # Responsibilities
//! - Add realistic latency to order processing
//! - Fail a fixed fraction of calls (10% normal, 30% chaos mode)
//!
//! # Design Decisions
//! - Delay is a tokio sleep, never a thread block
//! - Probability model is a pure function of an RNG so it can be seeded in tests

pub mod simulator;

pub use simulator::{ChaosSimulator, WorkOutcome, WorkPlan};
