//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Build state → Bind listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → In-flight requests finish → Flush logs → Exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
