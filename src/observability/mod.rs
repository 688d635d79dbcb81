//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! adapter, ledger, driver produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Run ID and transaction hash flow through every log line of a poll
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
