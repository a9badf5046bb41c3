//! Value types for the censorship monitor: canonical blocks, mempool
//! transactions and censorship findings, plus the conversions from raw
//! JSON-RPC payloads (all numerics as `0x`-prefixed hex strings) into
//! typed values. Everything downstream of this crate works with
//! fixed-width integers only.

mod block;
mod finding;
mod serde_helpers;
mod transaction;

pub use self::{
    block::{Block, RawBlock},
    finding::Finding,
    serde_helpers::{
        format_hex_u64, parse_address, parse_hash, parse_hex_u128, parse_hex_u64,
        parse_numeric_u64, BadPayload,
    },
    transaction::{RawTransaction, Tx, TxCommon},
};
