//! Poll loop that carries a single run to a terminal state.
//!
//! # Responsibilities
//! - Invoke `perform` once per tick and persist the proposed data
//! - Bound consecutive submission attempts that failed retryably
//! - Stop on a terminal output, the poll limit, or shutdown
//!
//! # Data Flow
//! ```text
//! RunInput → EthTxAdapter::perform → RunOutput
//!     Error / Complete        → stop
//!     PendingConfirmations    → data fed back, status AwaitingConfirmation
//!     PendingConnection       → input unchanged
//!     → sleep (interval, or backoff after a retryable submission failure)
//!     → next tick
//! ```

use std::time::Duration;

use tokio::sync::broadcast;

use crate::adapter::{EthTxAdapter, RunInput, RunOutput, RunStatus, Step, SubmissionAttempt};
use crate::config::PollerConfig;
use crate::resilience::SubmissionRetryPolicy;

/// Why the driver stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The run produced Error or Complete.
    Terminal,
    /// Too many consecutive submission attempts failed.
    RetriesExhausted,
    /// The configured poll limit was reached.
    MaxPolls,
    /// Shutdown was requested.
    Shutdown,
}

/// Final state of a driven run.
#[derive(Debug, Clone)]
pub struct DriveReport {
    /// Last output produced for the run.
    pub output: RunOutput,
    /// Input that would have been used for the next poll.
    pub input: RunInput,
    pub polls: u32,
    pub reason: StopReason,
}

pub struct RunDriver {
    adapter: EthTxAdapter,
    interval: Duration,
    max_polls: u32,
    retry: SubmissionRetryPolicy,
}

impl RunDriver {
    pub fn new(adapter: EthTxAdapter, poller: &PollerConfig, retry: SubmissionRetryPolicy) -> Self {
        Self {
            adapter,
            interval: Duration::from_millis(poller.interval_ms),
            max_polls: poller.max_polls,
            retry,
        }
    }

    /// Poll `input` until it stops. The receiver is checked between polls.
    pub async fn drive(&self, mut input: RunInput, mut shutdown: broadcast::Receiver<()>) -> DriveReport {
        let mut polls = 0u32;
        let mut failed_submissions = 0u32;

        tracing::info!(run_id = %input.run_id, interval_ms = self.interval.as_millis() as u64, "Driving run");

        loop {
            let Step { output, attempt } = self.adapter.step(&input).await;
            polls += 1;

            if output.status().is_terminal() {
                tracing::info!(run_id = %input.run_id, polls, status = ?output.status(), "Run finished");
                return DriveReport { output, input, polls, reason: StopReason::Terminal };
            }

            if let RunOutput::PendingConfirmations(data) = &output {
                input.status = RunStatus::AwaitingConfirmation;
                input.data = data.clone();
            }

            // Only polls that actually tried to submit count against the
            // retry budget; an unreachable ledger is waited out.
            let delay = match attempt {
                Some(SubmissionAttempt::Retryable) => {
                    failed_submissions += 1;
                    match self.retry.next_delay(failed_submissions) {
                        Some(backoff) => backoff,
                        None => {
                            tracing::error!(
                                run_id = %input.run_id,
                                attempts = failed_submissions,
                                "Giving up after repeated submission failures"
                            );
                            let output = RunOutput::error(format!(
                                "transaction submission failed {} consecutive times",
                                failed_submissions
                            ));
                            return DriveReport { output, input, polls, reason: StopReason::RetriesExhausted };
                        }
                    }
                }
                Some(_) => {
                    failed_submissions = 0;
                    self.interval
                }
                None => self.interval,
            };

            if self.max_polls != 0 && polls >= self.max_polls {
                tracing::warn!(run_id = %input.run_id, polls, "Poll limit reached before the run finished");
                return DriveReport { output, input, polls, reason: StopReason::MaxPolls };
            }

            tracing::debug!(run_id = %input.run_id, delay_ms = delay.as_millis() as u64, "Waiting for next poll");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(run_id = %input.run_id, polls, "Run driver received shutdown signal");
                    return DriveReport { output, input, polls, reason: StopReason::Shutdown };
                }
            }
        }
    }
}
