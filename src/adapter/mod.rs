//! Transaction submission and confirmation state machine.
//!
//! # Data Flow
//! ```text
//! perform(RunInput)
//!     → connectivity gate (ledger unreachable?)
//!         awaiting confirmation → PendingConfirmations(input data)
//!         otherwise             → PendingConnection
//!     → awaiting confirmation with a recorded hash?
//!         yes → tracker.rs (status lookup)
//!                 → receipts.rs (append receipt, Complete)
//!         no  → encoder.rs (call data)
//!                 → submitter.rs (create transaction, PendingConfirmations)
//! ```
//!
//! # Design Decisions
//! - One `perform` call per scheduler tick; nothing blocks beyond the awaited
//!   ledger calls and no state is kept between calls
//! - A recorded hash is the only gate against resubmission; the ledger's
//!   idempotency key (the run id) covers the window before it is persisted
//! - Confirmation is always checked on a later poll, never right after submit

pub mod encoder;
pub mod error;
pub mod job;
pub mod receipts;
pub mod run;
pub mod submitter;
pub mod tracker;

use std::sync::Arc;

use tracing::Instrument;

pub use encoder::{CallData, DecodedCallData};
pub use error::{AdapterError, EncodingError};
pub use job::{DataFormat, EthTxConfig, FunctionSelector};
pub use run::{RunInput, RunOutput, RunStatus};
pub use submitter::{SubmissionAttempt, SubmissionOutcome, TransactionSubmitter};
pub use tracker::ConfirmationTracker;

use crate::blockchain::Ledger;
use crate::observability::metrics;

/// One poll of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub output: RunOutput,
    /// Set when this poll asked the ledger to create a transaction.
    pub attempt: Option<SubmissionAttempt>,
}

impl Step {
    fn without_submission(output: RunOutput) -> Self {
        Self { output, attempt: None }
    }
}

/// Entry point driving one run step against a ledger.
#[derive(Clone)]
pub struct EthTxAdapter {
    ledger: Arc<dyn Ledger>,
    config: EthTxConfig,
}

impl EthTxAdapter {
    pub fn new(ledger: Arc<dyn Ledger>, config: EthTxConfig) -> Self {
        Self { ledger, config }
    }

    /// Compute the next state of a run.
    pub async fn perform(&self, input: &RunInput) -> RunOutput {
        self.step(input).await.output
    }

    /// Like [`perform`](Self::perform), also reporting whether a submission
    /// was attempted and how it went.
    pub async fn step(&self, input: &RunInput) -> Step {
        let span = tracing::debug_span!("perform", run_id = %input.run_id, status = ?input.status);
        let step = self.dispatch(input).instrument(span).await;
        metrics::record_run_output(status_label(&step.output));
        if let RunOutput::Error(reason) = &step.output {
            tracing::error!(run_id = %input.run_id, error = %reason, "Run errored");
        }
        step
    }

    async fn dispatch(&self, input: &RunInput) -> Step {
        let connected = self.ledger.is_connected().await;
        metrics::record_ledger_connected(connected);
        if !connected {
            return Step::without_submission(pending_confirmations_or_connection(input));
        }

        if input.status.is_awaiting_confirmation() {
            if tracker::recorded_hash(input).is_some() {
                let output = ConfirmationTracker::new(self.ledger.as_ref())
                    .check(input)
                    .await
                    .unwrap_or_else(RunOutput::error);
                return Step::without_submission(output);
            }
            tracing::debug!(run_id = %input.run_id, "No transaction hash recorded, submitting again");
        }

        let call_data = match CallData::build(&self.config, &input.result) {
            Ok(call_data) => call_data,
            Err(e) => return Step::without_submission(RunOutput::error(AdapterError::from(e))),
        };

        let (output, attempt) = TransactionSubmitter::new(self.ledger.as_ref(), &self.config)
            .submit_for_run(input, &call_data)
            .await;
        Step { output, attempt: Some(attempt) }
    }
}

/// Output for an unreachable ledger.
///
/// A run already awaiting confirmation keeps its data so the next poll does
/// not submit again; anything else waits for the connection.
fn pending_confirmations_or_connection(input: &RunInput) -> RunOutput {
    if input.status.is_awaiting_confirmation() {
        tracing::debug!(run_id = %input.run_id, "Ledger unreachable, keeping confirmation state");
        return RunOutput::PendingConfirmations(input.data.clone());
    }
    tracing::debug!(run_id = %input.run_id, "Ledger unreachable, waiting for connection");
    RunOutput::PendingConnection
}

fn status_label(output: &RunOutput) -> &'static str {
    match output {
        RunOutput::Error(_) => "error",
        RunOutput::PendingConnection => "pending_connection",
        RunOutput::PendingConfirmations(_) => "pending_confirmations",
        RunOutput::Complete(_) => "complete",
    }
}
