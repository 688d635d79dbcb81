//! Error taxonomy of the adapter.

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::blockchain::LedgerError;

/// Why a result could not be turned into call data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported encoding for value of type {value_type} in format '{format}'")]
    UnsupportedValue {
        format: &'static str,
        value_type: &'static str,
    },

    #[error("invalid hex '{0}'")]
    InvalidHex(String),

    #[error("error parsing number '{0}'")]
    InvalidNumber(String),

    #[error("{0} cannot be represented as uint256")]
    OutOfRange(String),

    #[error("value is {0} bytes, longer than one 32-byte word")]
    TooLong(usize),
}

/// Errors that end a run or get classified into retry decisions.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("while constructing call data: {0}")]
    Encoding(#[from] EncodingError),

    #[error("submitting transaction: {0}")]
    Submission(LedgerError),

    #[error("looking up transaction: {0}")]
    Lookup(LedgerError),

    #[error("no transaction hash recorded for run; found {0:?}")]
    MissingHash(String),

    #[error("transaction never succeeded")]
    TransactionFailed(TxHash),

    #[error("missing receipt for transaction")]
    MissingReceipt(TxHash),

    #[error("persisting run data: {0}")]
    Data(#[from] serde_json::Error),
}
