//! Ledger-facing types and error definitions.

use alloy::primitives::{Address, Bytes, TxHash, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors reported by a ledger implementation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No transaction is known under the given hash.
    #[error("transaction {0} not found")]
    NotFound(TxHash),

    /// The ledger refused the request and will refuse it again.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Ledger not initialized or disabled.
    #[error("Ledger not available: {0}")]
    NotAvailable(String),
}

impl LedgerError {
    /// Whether resubmitting the same request later may succeed.
    ///
    /// Only deterministic rejections are final; transport trouble, timeouts
    /// and unknown failures are treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LedgerError::Rejected(_) | LedgerError::ChainMismatch { .. })
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A request to create one outgoing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Key under which the ledger deduplicates creation requests.
    pub idempotency_key: String,
    /// Destination contract.
    pub to: Address,
    /// Full call data (selector, prefix, payload).
    pub data: Bytes,
    /// Gas price in wei; `None` leaves it to the ledger.
    pub gas_price: Option<u128>,
    /// Gas limit; `None` leaves it to the ledger.
    pub gas_limit: Option<u64>,
}

/// The ledger's view of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: TxHash,
    /// Block number the transaction was first seen at, if known.
    pub sent_at: Option<u64>,
    pub confirmed: bool,
    pub failed: bool,
}

impl TxRecord {
    /// A freshly broadcast transaction that is neither confirmed nor failed.
    pub fn pending(hash: TxHash, sent_at: Option<u64>) -> Self {
        Self {
            hash,
            sent_at,
            confirmed: false,
            failed: false,
        }
    }
}

/// On-chain confirmation evidence for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    #[serde(rename = "transactionHash")]
    pub hash: TxHash,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    /// `true` when the transaction executed successfully.
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_status() -> bool {
    true
}
