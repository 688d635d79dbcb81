//! Confirmation tracking for submitted transactions.
//!
//! # Outcomes
//! ```text
//! record lookup fails      → Error (lookup)
//! record.failed            → Error ("transaction never succeeded")
//! !record.confirmed        → PendingConfirmations, hash kept in
//!                            `result` and `latestOutgoingTxHash`
//! confirmed, no receipt    → Error ("missing receipt for transaction")
//! confirmed, receipt       → receipt appended to history, Complete
//! ```

use alloy::primitives::TxHash;
use serde_json::Value;

use crate::adapter::error::AdapterError;
use crate::adapter::receipts::add_receipt_to_result;
use crate::adapter::run::{RunInput, RunOutput, LATEST_OUTGOING_TX_HASH_KEY, RESULT_KEY};
use crate::blockchain::Ledger;
use crate::observability::metrics;

/// The transaction hash recorded for a run, if one parses.
pub fn recorded_hash(input: &RunInput) -> Option<TxHash> {
    input.recorded_result()?.parse().ok()
}

/// Re-queries the status of a run's transaction on every poll.
pub struct ConfirmationTracker<'a> {
    ledger: &'a dyn Ledger,
}

impl<'a> ConfirmationTracker<'a> {
    pub fn new(ledger: &'a dyn Ledger) -> Self {
        Self { ledger }
    }

    /// Classify the recorded transaction and produce the next run state.
    pub async fn check(&self, input: &RunInput) -> Result<RunOutput, AdapterError> {
        let hash = recorded_hash(input).ok_or_else(|| {
            AdapterError::MissingHash(input.recorded_result().unwrap_or_default().to_string())
        })?;

        let tx = self
            .ledger
            .find_transaction_by_hash(hash)
            .await
            .map_err(AdapterError::Lookup)?;

        let mut data = input.data_object();
        data.insert(RESULT_KEY.to_string(), Value::String(tx.hash.to_string()));

        if tx.failed {
            metrics::record_confirmation_check("failed");
            return Err(AdapterError::TransactionFailed(tx.hash));
        }

        if !tx.confirmed {
            metrics::record_confirmation_check("pending");
            tracing::debug!(run_id = %input.run_id, tx_hash = %tx.hash, sent_at = ?tx.sent_at, "Transaction not yet confirmed");
            data.insert(
                LATEST_OUTGOING_TX_HASH_KEY.to_string(),
                Value::String(tx.hash.to_string()),
            );
            return Ok(RunOutput::pending_confirmations(data));
        }

        let receipt = self
            .ledger
            .get_receipt(tx.hash)
            .await
            .map_err(AdapterError::Lookup)?
            .ok_or(AdapterError::MissingReceipt(tx.hash))?;

        metrics::record_confirmation_check("confirmed");
        add_receipt_to_result(receipt, input, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::run::RunStatus;
    use crate::blockchain::{MemoryLedger, TxRecord};
    use serde_json::json;

    fn awaiting(hash: TxHash) -> RunInput {
        RunInput::new(
            "run-1",
            RunStatus::AwaitingConfirmation,
            Value::Null,
            json!({ "result": hash.to_string() }),
        )
    }

    #[test]
    fn test_recorded_hash_parsing() {
        let hash = TxHash::repeat_byte(0x42);
        assert_eq!(recorded_hash(&awaiting(hash)), Some(hash));

        let garbage = RunInput::new("run-1", RunStatus::AwaitingConfirmation, Value::Null, json!({ "result": "12.5" }));
        assert_eq!(recorded_hash(&garbage), None);
    }

    #[tokio::test]
    async fn test_unknown_hash_is_lookup_error() {
        let ledger = MemoryLedger::new();
        let err = ConfirmationTracker::new(&ledger)
            .check(&awaiting(TxHash::repeat_byte(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_failed_wins_over_confirmed() {
        let ledger = MemoryLedger::new();
        let hash = TxHash::repeat_byte(2);
        ledger.insert_record(TxRecord {
            hash,
            sent_at: Some(5),
            confirmed: true,
            failed: true,
        });

        let err = ConfirmationTracker::new(&ledger).check(&awaiting(hash)).await.unwrap_err();
        assert_eq!(err.to_string(), "transaction never succeeded");
    }

    #[tokio::test]
    async fn test_unconfirmed_mirrors_hash() {
        let ledger = MemoryLedger::new();
        let hash = TxHash::repeat_byte(3);
        ledger.insert_record(TxRecord::pending(hash, Some(5)));

        let output = ConfirmationTracker::new(&ledger).check(&awaiting(hash)).await.unwrap();
        let data = output.data().unwrap();
        assert_eq!(output.status(), RunStatus::AwaitingConfirmation);
        assert_eq!(data[RESULT_KEY], hash.to_string());
        assert_eq!(data[LATEST_OUTGOING_TX_HASH_KEY], hash.to_string());
    }

    #[tokio::test]
    async fn test_confirmed_without_receipt() {
        let ledger = MemoryLedger::new();
        let hash = TxHash::repeat_byte(4);
        ledger.confirm_without_receipt(hash);

        let err = ConfirmationTracker::new(&ledger).check(&awaiting(hash)).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingReceipt(h) if h == hash));
    }

    #[tokio::test]
    async fn test_confirmed_completes() {
        let ledger = MemoryLedger::new();
        let hash = TxHash::repeat_byte(5);
        ledger.confirm(hash, 77);

        let output = ConfirmationTracker::new(&ledger).check(&awaiting(hash)).await.unwrap();
        assert_eq!(output.status(), RunStatus::Completed);
        let data = output.data().unwrap();
        assert_eq!(data["ethereumReceipts"][0]["blockNumber"], 77);
    }
}
