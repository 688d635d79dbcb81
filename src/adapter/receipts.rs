//! Receipt history aggregation.
//!
//! Earlier entries are kept exactly as persisted; only the new receipt is
//! serialized by this crate.

use serde_json::{Map, Value};

use crate::adapter::error::AdapterError;
use crate::adapter::run::{RunInput, RunOutput, RECEIPTS_KEY, RESULT_KEY};
use crate::blockchain::TxReceipt;
use crate::observability::metrics;

/// Read the persisted receipt history.
///
/// A missing history is empty. A history that is not an array is logged,
/// counted and replaced by an empty one so that the new receipt still lands.
pub fn receipt_history(input: &RunInput) -> Vec<Value> {
    match input.data.get(RECEIPTS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries.clone(),
        Some(other) => {
            metrics::record_receipt_history_parse_failure();
            tracing::error!(
                run_id = %input.run_id,
                found = %other,
                "Error unmarshaling ethereum receipts, starting from empty history"
            );
            Vec::new()
        }
    }
}

/// Append `receipt` to the run's history and finish the run.
///
/// `data` is the output being built for this poll; the updated history and
/// the receipt's hash as `result` are written into it.
pub fn add_receipt_to_result(
    receipt: TxReceipt,
    input: &RunInput,
    mut data: Map<String, Value>,
) -> Result<RunOutput, AdapterError> {
    let mut receipts = receipt_history(input);
    let hash = receipt.hash;
    receipts.push(serde_json::to_value(&receipt)?);

    tracing::info!(
        run_id = %input.run_id,
        tx_hash = %hash,
        receipts = receipts.len(),
        "Receipt recorded, run complete"
    );

    data.insert(RECEIPTS_KEY.to_string(), Value::Array(receipts));
    data.insert(RESULT_KEY.to_string(), Value::String(hash.to_string()));
    Ok(RunOutput::complete(data))
}
