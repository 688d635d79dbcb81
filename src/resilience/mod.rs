//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Submission failed with a retryable error:
//!     → retries.rs (budget left for this run?)
//!     → backoff.rs (how long until the next poll)
//! ```
//!
//! # Design Decisions
//! - Per-call deadlines live in the ledger, next to the RPC calls
//! - Jittered backoff spreads resubmissions of many runs

pub mod backoff;
pub mod retries;

pub use retries::SubmissionRetryPolicy;
