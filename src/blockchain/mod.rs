//! Ledger subsystem.
//!
//! # Data Flow
//! ```text
//! BlockchainConfig (RPC URLs, chain id, sender)
//!     → client.rs (RpcLedger: send, query, failover with timeouts)
//!     → ledger.rs (Ledger trait consumed by the adapter)
//! memory.rs (MemoryLedger) implements the same trait in process
//! ```
//!
//! # Constraints
//! - The adapter never signs or assigns nonces; the node or the ledger does
//! - All RPC calls have configurable timeouts
//! - An unreachable chain is reported, never fatal at startup

pub mod client;
pub mod ledger;
pub mod memory;
pub mod types;

pub use client::RpcLedger;
pub use ledger::Ledger;
pub use memory::MemoryLedger;
pub use types::{BlockchainConfig, ChainId, LedgerError, LedgerResult, TxReceipt, TxRecord, TxRequest};
