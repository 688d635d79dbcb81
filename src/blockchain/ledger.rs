//! The ledger contract consumed by the adapter.

use alloy::primitives::TxHash;
use async_trait::async_trait;

use crate::blockchain::types::{LedgerResult, TxReceipt, TxRecord, TxRequest};

/// Transaction manager and chain query surface.
///
/// Implementations own signing, nonce assignment, broadcast and gas bumping.
/// The adapter only ever asks for creation and status.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the chain endpoint is currently reachable.
    async fn is_connected(&self) -> bool;

    /// Create (or return the already created) transaction for a request.
    ///
    /// Two requests with the same idempotency key yield the same hash.
    async fn create_transaction(&self, request: TxRequest) -> LedgerResult<TxHash>;

    /// Look up a transaction record. Unknown hashes are an error.
    async fn find_transaction_by_hash(&self, hash: TxHash) -> LedgerResult<TxRecord>;

    /// Fetch the receipt for a mined transaction, if there is one.
    async fn get_receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>>;
}
