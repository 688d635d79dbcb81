//! Run input and output exchanged with the scheduler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted data key holding the latest result (a transaction hash once submitted).
pub const RESULT_KEY: &str = "result";
/// Persisted data key mirroring the hash of the transaction being tracked.
pub const LATEST_OUTGOING_TX_HASH_KEY: &str = "latestOutgoingTxHash";
/// Persisted data key holding the append-only receipt history.
pub const RECEIPTS_KEY: &str = "ethereumReceipts";

/// Status of a run as persisted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Unstarted,
    InProgress,
    PendingConnection,
    /// A transaction hash has been recorded and is waiting to be confirmed.
    AwaitingConfirmation,
    Completed,
    Errored,
}

impl RunStatus {
    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, RunStatus::AwaitingConfirmation)
    }

    /// Whether the scheduler stops invoking the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Errored)
    }
}

/// Per-attempt context handed in by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// Identifier of the run; doubles as the submission idempotency key.
    pub run_id: String,
    pub status: RunStatus,
    /// Value produced by the upstream task.
    #[serde(default)]
    pub result: Value,
    /// Data persisted across polls of this run.
    #[serde(default)]
    pub data: Value,
}

impl RunInput {
    pub fn new(run_id: impl Into<String>, status: RunStatus, result: Value, data: Value) -> Self {
        Self {
            run_id: run_id.into(),
            status,
            result,
            data,
        }
    }

    /// The persisted data as an object; non-object data reads as empty.
    pub fn data_object(&self) -> Map<String, Value> {
        match &self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }

    /// The string stored under `result` in the persisted data, if any.
    pub fn recorded_result(&self) -> Option<&str> {
        self.data.get(RESULT_KEY).and_then(Value::as_str)
    }
}

/// The next state proposed for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum RunOutput {
    /// Fatal; the run stops.
    Error(String),
    /// The ledger is unreachable and nothing has been submitted.
    PendingConnection,
    /// Poll again later with this data.
    PendingConfirmations(Value),
    /// The run finished with this data.
    Complete(Value),
}

impl RunOutput {
    pub fn error(reason: impl ToString) -> Self {
        RunOutput::Error(reason.to_string())
    }

    pub fn pending_confirmations(data: Map<String, Value>) -> Self {
        RunOutput::PendingConfirmations(Value::Object(data))
    }

    pub fn complete(data: Map<String, Value>) -> Self {
        RunOutput::Complete(Value::Object(data))
    }

    /// Status the scheduler should persist for this output.
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutput::Error(_) => RunStatus::Errored,
            RunOutput::PendingConnection => RunStatus::PendingConnection,
            RunOutput::PendingConfirmations(_) => RunStatus::AwaitingConfirmation,
            RunOutput::Complete(_) => RunStatus::Completed,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            RunOutput::PendingConfirmations(data) | RunOutput::Complete(data) => Some(data),
            _ => None,
        }
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            RunOutput::Error(reason) => Some(reason),
            _ => None,
        }
    }
}
