//! Result encoding into call data.
//!
//! # Layout
//! ```text
//! call data = selector (4) ++ data prefix ++ payload
//!
//! empty format:  payload = word(result)
//! other formats: payload = offset word ++ encoded value
//!                offset  = 32 without prefix, 64 with prefix
//!                encoded value = length word ++ right-padded bytes
//! ```
//!
//! The offset word points at the dynamic value relative to the start of the
//! argument area, which is where the head/tail calling convention expects
//! variable-length arguments.

use alloy::primitives::{hex, Bytes, I256, U256};
use serde_json::Value;

use crate::adapter::error::EncodingError;
use crate::adapter::job::{DataFormat, EthTxConfig, FunctionSelector};

/// Size of one EVM word in bytes.
pub const EVM_WORD_LEN: usize = 32;

/// A single EVM word holding an unsigned integer.
pub fn evm_word_u64(value: u64) -> [u8; EVM_WORD_LEN] {
    U256::from(value).to_be_bytes::<EVM_WORD_LEN>()
}

/// Encode bytes as a dynamic value: length word followed by the data
/// right-padded to a word boundary.
pub fn evm_encode_bytes(input: &[u8]) -> Vec<u8> {
    let padded_len = input.len().div_ceil(EVM_WORD_LEN) * EVM_WORD_LEN;
    let mut out = Vec::with_capacity(EVM_WORD_LEN + padded_len);
    out.extend_from_slice(&evm_word_u64(input.len() as u64));
    out.extend_from_slice(input);
    out.resize(EVM_WORD_LEN + padded_len, 0);
    out
}

/// Build the payload (everything after selector and prefix) for a result.
pub fn encode_payload(
    result: &Value,
    format: DataFormat,
    data_prefix: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    if !format.uses_offset_word() {
        return Ok(transcode_bytes32(result)?.to_vec());
    }

    let offset = if data_prefix.is_empty() {
        EVM_WORD_LEN
    } else {
        EVM_WORD_LEN * 2
    };
    let value = transcode(result, format)?;

    let mut payload = Vec::with_capacity(EVM_WORD_LEN + value.len());
    payload.extend_from_slice(&evm_word_u64(offset as u64));
    payload.extend_from_slice(&value);
    Ok(payload)
}

/// Transcode a result into the dynamic value of a non-empty format.
pub fn transcode(result: &Value, format: DataFormat) -> Result<Vec<u8>, EncodingError> {
    match format {
        DataFormat::Bytes32 => Ok(transcode_bytes32(result)?.to_vec()),
        DataFormat::Bytes => transcode_bytes(result),
        DataFormat::Preformatted => match result {
            Value::String(s) => decode_hex(s),
            other => Err(unsupported(format, other)),
        },
        DataFormat::Uint256 => {
            let word = parse_uint256(result, format)?.to_be_bytes::<EVM_WORD_LEN>();
            Ok(evm_encode_bytes(&word))
        }
        DataFormat::Int256 => {
            let word = parse_int256(result, format)?.to_be_bytes::<EVM_WORD_LEN>();
            Ok(evm_encode_bytes(&word))
        }
        DataFormat::Bool => {
            let flag = match result {
                Value::Bool(b) => *b,
                Value::Null => false,
                Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                Value::String(s) => !s.is_empty(),
                other => return Err(unsupported(format, other)),
            };
            Ok(evm_encode_bytes(&evm_word_u64(flag as u64)))
        }
    }
}

/// The result as one left-padded 32-byte word.
fn transcode_bytes32(result: &Value) -> Result<[u8; EVM_WORD_LEN], EncodingError> {
    match result {
        Value::String(s) => {
            let digits = hex_digits(s)?;
            let decoded = if digits.len() % 2 == 1 {
                hex::decode(format!("0{}", digits))
            } else {
                hex::decode(digits)
            };
            let bytes = decoded.map_err(|_| EncodingError::InvalidHex(s.to_string()))?;
            if bytes.len() > EVM_WORD_LEN {
                return Err(EncodingError::TooLong(bytes.len()));
            }
            let mut word = [0u8; EVM_WORD_LEN];
            word[EVM_WORD_LEN - bytes.len()..].copy_from_slice(&bytes);
            Ok(word)
        }
        Value::Number(_) => Ok(parse_uint256(result, DataFormat::Bytes32)?.to_be_bytes::<EVM_WORD_LEN>()),
        other => Err(unsupported(DataFormat::Bytes32, other)),
    }
}

fn transcode_bytes(result: &Value) -> Result<Vec<u8>, EncodingError> {
    match result {
        Value::String(s) => Ok(evm_encode_bytes(s.as_bytes())),
        Value::Bool(b) => Ok(evm_encode_bytes(&evm_word_u64(*b as u64))),
        Value::Number(_) => {
            let word = parse_int256(result, DataFormat::Bytes)?.to_be_bytes::<EVM_WORD_LEN>();
            Ok(evm_encode_bytes(&word))
        }
        other => Err(unsupported(DataFormat::Bytes, other)),
    }
}

fn parse_uint256(value: &Value, format: DataFormat) -> Result<U256, EncodingError> {
    let literal = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(U256::from(u));
            }
            number_literal(n)?
        }
        Value::String(s) => integer_part(s)?,
        other => return Err(unsupported(format, other)),
    };

    if literal.starts_with('-') {
        return Err(EncodingError::OutOfRange(literal));
    }
    literal
        .parse::<U256>()
        .map_err(|_| EncodingError::InvalidNumber(literal))
}

fn parse_int256(value: &Value, format: DataFormat) -> Result<I256, EncodingError> {
    let literal = match value {
        Value::Number(n) => number_literal(n)?,
        Value::String(s) => integer_part(s)?,
        other => return Err(unsupported(format, other)),
    };
    literal
        .parse::<I256>()
        .map_err(|_| EncodingError::InvalidNumber(literal))
}

/// Integer text of a JSON number; fractions are truncated toward zero.
fn number_literal(n: &serde_json::Number) -> Result<String, EncodingError> {
    if let Some(i) = n.as_i64() {
        return Ok(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.to_string());
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(format!("{:.0}", f.trunc())),
        _ => Err(EncodingError::InvalidNumber(n.to_string())),
    }
}

/// Integer part of a numeric string. Hex strings pass through untouched.
fn integer_part(s: &str) -> Result<String, EncodingError> {
    let s = s.trim();
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
        return Ok(s.to_string());
    }
    let integer = s.split('.').next().unwrap_or_default();
    if integer.is_empty() || integer == "-" {
        return Err(EncodingError::InvalidNumber(s.to_string()));
    }
    Ok(integer.to_string())
}

/// Digits of a hex string with at most one `0x`/`0X` prefix removed.
fn hex_digits(s: &str) -> Result<&str, EncodingError> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EncodingError::InvalidHex(s.to_string()));
    }
    Ok(digits)
}

fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    hex::decode(hex_digits(s)?).map_err(|_| EncodingError::InvalidHex(s.to_string()))
}

fn unsupported(format: DataFormat, value: &Value) -> EncodingError {
    let value_type = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    EncodingError::UnsupportedValue {
        format: format.as_str(),
        value_type,
    }
}

/// Call data split into its three parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    pub selector: FunctionSelector,
    pub prefix: Bytes,
    pub payload: Bytes,
}

impl CallData {
    /// Encode a result according to a job configuration.
    pub fn build(config: &EthTxConfig, result: &Value) -> Result<Self, EncodingError> {
        let payload = encode_payload(result, config.format, &config.data_prefix)?;
        Ok(Self {
            selector: config.function_selector,
            prefix: config.data_prefix.clone(),
            payload: Bytes::from(payload),
        })
    }

    /// Concatenated bytes sent as transaction input.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(4 + self.prefix.len() + self.payload.len());
        out.extend_from_slice(&self.selector.as_bytes());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&self.payload);
        Bytes::from(out)
    }

    /// Split raw call data back into selector, prefix and encoded value.
    ///
    /// The prefix length and format must match what was used to build it.
    pub fn decode(
        data: &[u8],
        prefix_len: usize,
        format: DataFormat,
    ) -> Result<DecodedCallData, EncodingError> {
        let head = 4 + prefix_len;
        if data.len() < head {
            return Err(EncodingError::InvalidHex(hex::encode_prefixed(data)));
        }

        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        let prefix = Bytes::copy_from_slice(&data[4..head]);
        let payload = &data[head..];

        if !format.uses_offset_word() {
            if payload.len() != EVM_WORD_LEN {
                return Err(EncodingError::InvalidHex(hex::encode_prefixed(payload)));
            }
            return Ok(DecodedCallData {
                selector: FunctionSelector::new(selector),
                prefix,
                offset: None,
                value: Bytes::copy_from_slice(payload),
            });
        }

        if payload.len() < EVM_WORD_LEN {
            return Err(EncodingError::InvalidHex(hex::encode_prefixed(payload)));
        }
        let offset = U256::from_be_slice(&payload[..EVM_WORD_LEN]);
        Ok(DecodedCallData {
            selector: FunctionSelector::new(selector),
            prefix,
            offset: Some(offset),
            value: Bytes::copy_from_slice(&payload[EVM_WORD_LEN..]),
        })
    }
}

/// Parts recovered from call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCallData {
    pub selector: FunctionSelector,
    pub prefix: Bytes,
    /// Offset word, absent for the fixed 32-byte encoding.
    pub offset: Option<U256>,
    /// Encoded value exactly as produced by [`transcode`].
    pub value: Bytes,
}

impl DecodedCallData {
    /// The unpadded contents of a length-prefixed dynamic value.
    pub fn dynamic_bytes(&self) -> Option<&[u8]> {
        if self.offset.is_none() || self.value.len() < EVM_WORD_LEN {
            return None;
        }
        let len = U256::from_be_slice(&self.value[..EVM_WORD_LEN]);
        if len > U256::from(self.value.len() - EVM_WORD_LEN) {
            return None;
        }
        let len = len.as_limbs()[0] as usize;
        self.value.get(EVM_WORD_LEN..EVM_WORD_LEN + len)
    }
}
