//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl+C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → every RunDriver stops after its current poll
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
