//! Ethereum transaction adapter.
//!
//! Turns the result of an upstream task into a contract call, submits it once
//! through a ledger and follows it until a receipt is recorded.

pub mod adapter;
pub mod blockchain;
pub mod config;
pub mod driver;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use adapter::{EthTxAdapter, RunInput, RunOutput, RunStatus, Step};
pub use config::schema::AppConfig;
pub use driver::{DriveReport, RunDriver, StopReason};
pub use lifecycle::Shutdown;
