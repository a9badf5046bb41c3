use crate::serde_helpers::{parse_hash, parse_hex_u128, parse_hex_u64, required, BadPayload};
use crate::transaction::{RawTransaction, Tx};
use alloy::primitives::B256;
use serde::Deserialize;

/// A canonical block as reported by the execution client. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    /// Unix seconds.
    pub timestamp: u64,
    /// Wei per gas.
    pub base_fee_per_gas: u128,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// Opaque producer identity (the fee recipient as reported upstream).
    /// Findings are attributed to it; the monitor never interprets it.
    pub producer_id: String,
    pub transactions: Vec<Tx>,
}

/// Block payload as served by `eth_getBlockByNumber(.., true)`. Unknown
/// fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: Option<String>,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    pub timestamp: Option<String>,
    pub base_fee_per_gas: Option<String>,
    pub gas_limit: Option<String>,
    pub gas_used: Option<String>,
    pub miner: Option<String>,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

impl RawBlock {
    /// Converts into a typed block. A malformed header field fails the whole
    /// conversion; a malformed transaction body is dropped with a warning so
    /// one odd entry cannot suppress analysis of the rest of the block.
    /// `first_seen` is assigned to every body the monitor has no earlier
    /// sighting for.
    pub fn into_block(self, first_seen: u64) -> Result<Block, BadPayload> {
        let number = parse_hex_u64("number", required("number", &self.number)?)?;
        let mut transactions = Vec::with_capacity(self.transactions.len());
        for raw in self.transactions {
            match raw.into_tx(first_seen) {
                Ok(tx) => transactions.push(tx),
                Err(err) => {
                    tracing::warn!(block = number, %err, "dropping undecodable block transaction");
                }
            }
        }
        Ok(Block {
            number,
            hash: parse_hash("hash", required("hash", &self.hash)?)?,
            parent_hash: parse_hash("parentHash", required("parentHash", &self.parent_hash)?)?,
            timestamp: parse_hex_u64("timestamp", required("timestamp", &self.timestamp)?)?,
            base_fee_per_gas: parse_hex_u128(
                "baseFeePerGas",
                required("baseFeePerGas", &self.base_fee_per_gas)?,
            )?,
            gas_limit: parse_hex_u64("gasLimit", required("gasLimit", &self.gas_limit)?)?,
            gas_used: parse_hex_u64("gasUsed", required("gasUsed", &self.gas_used)?)?,
            producer_id: required("miner", &self.miner)?.to_lowercase(),
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_block() -> RawBlock {
        serde_json::from_value(json!({
            "number": "0xed14f2",
            "hash": "0x1106290f5fff61aa181e26d9fcd985fed8404d35de2d448adb428a4501628cb3",
            "parentHash": "0x0b51c8d0ba5dd9e9f9773a241f6a0c20bdb58d8e37424b40da6196d99859ea7e",
            "timestamp": "0x6324a955",
            "baseFeePerGas": "0x174876e800",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0xe4e1c0",
            "miner": "0x388C818CA8B9251b393131C08a736A67ccB19297",
            "stateRoot": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "transactions": [
                {
                    "hash": "0x66e184c04b58a073a5b15ffb4d5a77e66f20f484ec3071a72edabf70bbe4c030",
                    "from": "0xebec795c9c8bbd61ffc14a6662944748f299cacf",
                    "nonce": "0x0",
                    "gas": "0x5208",
                    "type": "0x0",
                    "gasPrice": "0x1bf08eb000"
                },
                {
                    "hash": "0xbe4ee7bd5db427d3d213951c9b99eaa29b714dc161e3ca524816ac987b6874d5",
                    "from": "0x388c818ca8b9251b393131c08a736a67ccb19297",
                    "nonce": "0xbad"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn converts_header_and_keeps_decodable_transactions() {
        let block = raw_block().into_block(50).unwrap();
        assert_eq!(block.number, 15_537_394);
        assert_eq!(block.base_fee_per_gas, 100_000_000_000);
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.producer_id, "0x388c818ca8b9251b393131c08a736a67ccb19297");
        // The second body is missing its gas field and gets dropped.
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].first_seen(), 50);
    }

    #[test]
    fn missing_header_field_fails_conversion() {
        let mut raw = raw_block();
        raw.base_fee_per_gas = None;
        assert_eq!(raw.into_block(0).unwrap_err().field, "baseFeePerGas");
    }
}
