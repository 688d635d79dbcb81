//! Idempotent transaction submission.

use alloy::primitives::TxHash;
use serde_json::Value;

use crate::adapter::encoder::CallData;
use crate::adapter::error::AdapterError;
use crate::adapter::job::EthTxConfig;
use crate::adapter::run::{RunInput, RunOutput, RESULT_KEY};
use crate::blockchain::{Ledger, LedgerError, TxRequest};
use crate::observability::metrics;

/// What came of one creation request.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// The ledger accepted the transaction under this hash.
    Submitted(TxHash),
    /// Sending failed in a way that may clear up on a later poll.
    Retryable(LedgerError),
    /// The ledger will never accept this request.
    Fatal(LedgerError),
}

impl SubmissionOutcome {
    fn classify(result: Result<TxHash, LedgerError>) -> Self {
        match result {
            Ok(hash) => SubmissionOutcome::Submitted(hash),
            Err(e) if e.is_retryable() => SubmissionOutcome::Retryable(e),
            Err(e) => SubmissionOutcome::Fatal(e),
        }
    }

    pub fn attempt(&self) -> SubmissionAttempt {
        match self {
            SubmissionOutcome::Submitted(_) => SubmissionAttempt::Submitted,
            SubmissionOutcome::Retryable(_) => SubmissionAttempt::Retryable,
            SubmissionOutcome::Fatal(_) => SubmissionAttempt::Fatal,
        }
    }
}

/// Kind of a submission outcome, without the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionAttempt {
    Submitted,
    Retryable,
    Fatal,
}

/// Requests transaction creation for a run.
pub struct TransactionSubmitter<'a> {
    ledger: &'a dyn Ledger,
    config: &'a EthTxConfig,
}

impl<'a> TransactionSubmitter<'a> {
    pub fn new(ledger: &'a dyn Ledger, config: &'a EthTxConfig) -> Self {
        Self { ledger, config }
    }

    /// Ask the ledger for one transaction carrying `call_data`, keyed by the run id.
    pub async fn submit(&self, input: &RunInput, call_data: &CallData) -> SubmissionOutcome {
        let request = TxRequest {
            idempotency_key: input.run_id.clone(),
            to: self.config.address,
            data: call_data.to_bytes(),
            gas_price: self.config.gas_price,
            gas_limit: self.config.gas_limit,
        };
        SubmissionOutcome::classify(self.ledger.create_transaction(request).await)
    }

    /// Submit and map the outcome onto the next run state.
    ///
    /// A successful submission is never checked for confirmation here; the
    /// next poll does that. Retryable failures leave the input data untouched
    /// so no hash is recorded and the next poll submits again.
    pub async fn submit_for_run(&self, input: &RunInput, call_data: &CallData) -> (RunOutput, SubmissionAttempt) {
        let outcome = self.submit(input, call_data).await;
        let attempt = outcome.attempt();
        let output = match outcome {
            SubmissionOutcome::Submitted(hash) => {
                metrics::record_submission("submitted");
                tracing::info!(run_id = %input.run_id, tx_hash = %hash, to = %self.config.address, "Transaction submitted");

                let mut data = input.data_object();
                data.insert(RESULT_KEY.to_string(), Value::String(hash.to_string()));
                RunOutput::pending_confirmations(data)
            }
            SubmissionOutcome::Retryable(e) => {
                metrics::record_submission("retryable");
                tracing::warn!(run_id = %input.run_id, error = %e, "Transaction submission failed, retrying next poll");
                RunOutput::PendingConfirmations(input.data.clone())
            }
            SubmissionOutcome::Fatal(e) => {
                metrics::record_submission("fatal");
                RunOutput::error(AdapterError::Submission(e))
            }
        };
        (output, attempt)
    }
}
