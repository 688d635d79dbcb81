//! Bounds on resubmission after transient send failures.
//!
//! The adapter itself never gives up on a retryable failure; it hands the
//! run back for another poll. Whoever drives the polls applies this policy
//! to stop a run that keeps failing to get a transaction out.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionRetryPolicy {
    /// Consecutive failed submissions after which the run is abandoned
    /// (0 = unbounded).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl SubmissionRetryPolicy {
    /// Delay before the next poll after `failures` consecutive failed
    /// submissions, or `None` once the budget is spent.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        if self.max_attempts != 0 && failures >= self.max_attempts {
            return None;
        }
        Some(calculate_backoff(failures, self.base_delay_ms, self.max_delay_ms))
    }
}

impl From<&RetryConfig> for SubmissionRetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl Default for SubmissionRetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}
