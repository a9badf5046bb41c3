use alloy::primitives::{Address, B256};
use std::str::FromStr;

/// Malformed upstream data in a specific field of a block or transaction
/// payload. The offending payload is dropped; processing continues.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("bad payload: field `{field}`: {reason}")]
pub struct BadPayload {
    pub field: &'static str,
    pub reason: String,
}

impl BadPayload {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, "missing required field")
    }
}

pub(crate) fn required<'a>(
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, BadPayload> {
    value
        .as_deref()
        .ok_or_else(|| BadPayload::missing(field))
}

/// 0x-hex -> u64
pub fn parse_hex_u64(field: &'static str, value: &str) -> Result<u64, BadPayload> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| BadPayload::new(field, "expected 0x-prefixed hex"))?;
    u64::from_str_radix(digits, 16).map_err(|err| BadPayload::new(field, err.to_string()))
}

/// 0x-hex -> u128
pub fn parse_hex_u128(field: &'static str, value: &str) -> Result<u128, BadPayload> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| BadPayload::new(field, "expected 0x-prefixed hex"))?;
    u128::from_str_radix(digits, 16).map_err(|err| BadPayload::new(field, err.to_string()))
}

/// Accepts both `0x`-hex and decimal digits. `txpool_content` keys its
/// per-sender maps by decimal nonce strings while every other numeric
/// field on the wire is hex.
pub fn parse_numeric_u64(field: &'static str, value: &str) -> Result<u64, BadPayload> {
    match value.strip_prefix("0x") {
        Some(digits) => {
            u64::from_str_radix(digits, 16).map_err(|err| BadPayload::new(field, err.to_string()))
        }
        None => value
            .parse()
            .map_err(|err: std::num::ParseIntError| BadPayload::new(field, err.to_string())),
    }
}

/// 0x-hex -> 20-byte address
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, BadPayload> {
    Address::from_str(value).map_err(|err| BadPayload::new(field, err.to_string()))
}

/// 0x-hex -> 32-byte digest
pub fn parse_hash(field: &'static str, value: &str) -> Result<B256, BadPayload> {
    B256::from_str(value).map_err(|err| BadPayload::new(field, err.to_string()))
}

pub fn format_hex_u64(value: u64) -> String {
    format!("{value:#x}")
}
