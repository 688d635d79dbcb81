//! Static per-job settings for outgoing transactions.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::hex;
use alloy::primitives::{keccak256, Address, Bytes};
use serde::{Deserialize, Serialize};

/// Format marker selecting fixed 32-byte encoding.
pub const FORMAT_BYTES32: &str = "";
/// Format marker for a dynamic `bytes` value.
pub const FORMAT_BYTES: &str = "bytes";
/// Format marker for a value that is already ABI encoded.
pub const FORMAT_PREFORMATTED: &str = "preformatted";
/// Format marker for an unsigned 256-bit integer.
pub const FORMAT_UINT256: &str = "uint256";
/// Format marker for a signed 256-bit integer.
pub const FORMAT_INT256: &str = "int256";
/// Format marker for a boolean.
pub const FORMAT_BOOL: &str = "bool";

/// How the upstream result is turned into call data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataFormat {
    /// Empty format: the result as one fixed 32-byte word.
    #[default]
    Bytes32,
    Bytes,
    Preformatted,
    Uint256,
    Int256,
    Bool,
}

impl DataFormat {
    /// The marker string used in job configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Bytes32 => FORMAT_BYTES32,
            DataFormat::Bytes => FORMAT_BYTES,
            DataFormat::Preformatted => FORMAT_PREFORMATTED,
            DataFormat::Uint256 => FORMAT_UINT256,
            DataFormat::Int256 => FORMAT_INT256,
            DataFormat::Bool => FORMAT_BOOL,
        }
    }

    /// Whether the payload starts with an offset word.
    ///
    /// Only the fixed 32-byte encoding goes without one.
    pub fn uses_offset_word(&self) -> bool {
        !matches!(self, DataFormat::Bytes32)
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FORMAT_BYTES32 => Ok(DataFormat::Bytes32),
            FORMAT_BYTES => Ok(DataFormat::Bytes),
            FORMAT_PREFORMATTED => Ok(DataFormat::Preformatted),
            FORMAT_UINT256 => Ok(DataFormat::Uint256),
            FORMAT_INT256 => Ok(DataFormat::Int256),
            FORMAT_BOOL => Ok(DataFormat::Bool),
            other => Err(format!("unsupported format: {}", other)),
        }
    }
}

impl TryFrom<String> for DataFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataFormat> for String {
    fn from(format: DataFormat) -> Self {
        format.as_str().to_string()
    }
}

/// The 4-byte function selector prepended to call data.
///
/// Parses from either an explicit hex selector (`0x12345678`) or a Solidity
/// signature (`fulfill(bytes32,bytes32)`), whose keccak256 hash is truncated
/// to its first four bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionSelector([u8; 4]);

impl FunctionSelector {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Selector for a Solidity function signature.
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&hash[..4]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for FunctionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for FunctionSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('(') {
            return Ok(Self::from_signature(s));
        }

        let digits = s.strip_prefix("0x").unwrap_or(s);
        let decoded =
            hex::decode(digits).map_err(|e| format!("invalid function selector '{}': {}", s, e))?;
        let bytes: [u8; 4] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| format!("function selector must be 4 bytes, got {}", v.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for FunctionSelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FunctionSelector> for String {
    fn from(selector: FunctionSelector) -> Self {
        selector.to_string()
    }
}

/// Configuration of one transaction-producing job step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthTxConfig {
    /// Contract receiving the transaction.
    pub address: Address,

    #[serde(alias = "functionSelector")]
    pub function_selector: FunctionSelector,

    /// Bytes placed between the selector and the encoded result.
    #[serde(alias = "dataPrefix")]
    pub data_prefix: Bytes,

    pub format: DataFormat,

    /// Gas price in wei.
    #[serde(alias = "gasPrice")]
    pub gas_price: Option<u128>,

    #[serde(alias = "gasLimit")]
    pub gas_limit: Option<u64>,
}
