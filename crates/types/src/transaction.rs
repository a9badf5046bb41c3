use crate::serde_helpers::{
    parse_address, parse_hash, parse_hex_u128, parse_hex_u64, parse_numeric_u64, required,
    BadPayload,
};
use alloy::primitives::{Address, B256};
use serde::Deserialize;

/// Fields shared by both transaction variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCommon {
    pub hash: B256,
    pub sender: Address,
    pub nonce: u64,
    pub gas: u64,
    /// Unix seconds at which the monitor first saw this transaction.
    pub first_seen: u64,
}

/// A mempool or block transaction. Identity is the hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tx {
    /// Pre-EIP-1559 fee semantics (types 0 and 1; access lists do not
    /// change how the fee is paid).
    Legacy { common: TxCommon, gas_price: u128 },
    /// EIP-1559 fee semantics (type 2).
    DynamicFee {
        common: TxCommon,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl Tx {
    pub fn common(&self) -> &TxCommon {
        match self {
            Tx::Legacy { common, .. } | Tx::DynamicFee { common, .. } => common,
        }
    }

    fn common_mut(&mut self) -> &mut TxCommon {
        match self {
            Tx::Legacy { common, .. } | Tx::DynamicFee { common, .. } => common,
        }
    }

    pub fn hash(&self) -> B256 {
        self.common().hash
    }

    pub fn sender(&self) -> Address {
        self.common().sender
    }

    pub fn nonce(&self) -> u64 {
        self.common().nonce
    }

    pub fn gas(&self) -> u64 {
        self.common().gas
    }

    pub fn first_seen(&self) -> u64 {
        self.common().first_seen
    }

    pub fn set_first_seen(&mut self, first_seen: u64) {
        self.common_mut().first_seen = first_seen;
    }
}

/// Transaction body as served by the execution client, numerics still in
/// hex-string form. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub from: Option<String>,
    pub nonce: Option<String>,
    pub gas: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
}

impl RawTransaction {
    /// Converts into a typed transaction. `first_seen` is the ingestion
    /// timestamp used when no earlier sighting of the hash is known.
    ///
    /// Type `0x2` selects [`Tx::DynamicFee`]; every other type value
    /// (including absent) falls back to [`Tx::Legacy`].
    pub fn into_tx(self, first_seen: u64) -> Result<Tx, BadPayload> {
        let common = TxCommon {
            hash: parse_hash("hash", required("hash", &self.hash)?)?,
            sender: parse_address("from", required("from", &self.from)?)?,
            nonce: parse_hex_u64("nonce", required("nonce", &self.nonce)?)?,
            gas: parse_hex_u64("gas", required("gas", &self.gas)?)?,
            first_seen,
        };
        let tx_type = match &self.tx_type {
            Some(raw) => parse_numeric_u64("type", raw)?,
            None => 0,
        };
        if tx_type == 2 {
            Ok(Tx::DynamicFee {
                common,
                max_fee_per_gas: parse_hex_u128(
                    "maxFeePerGas",
                    required("maxFeePerGas", &self.max_fee_per_gas)?,
                )?,
                max_priority_fee_per_gas: parse_hex_u128(
                    "maxPriorityFeePerGas",
                    required("maxPriorityFeePerGas", &self.max_priority_fee_per_gas)?,
                )?,
            })
        } else {
            Ok(Tx::Legacy {
                common,
                gas_price: parse_hex_u128("gasPrice", required("gasPrice", &self.gas_price)?)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_dynamic() -> RawTransaction {
        serde_json::from_value(json!({
            "hash": "0x704ee73a7321961a12004b660ef943a1140079874b08d8f739658dc6c4b36241",
            "from": "0x388c818ca8b9251b393131c08a736a67ccb19297",
            "nonce": "0x7",
            "gas": "0x5208",
            "type": "0x2",
            "maxFeePerGas": "0x2e90edd000",
            "maxPriorityFeePerGas": "0x2540be400",
            "input": "0x",
            "v": "0x1"
        }))
        .unwrap()
    }

    #[test]
    fn dynamic_fee_conversion() {
        let tx = raw_dynamic().into_tx(100).unwrap();
        match &tx {
            Tx::DynamicFee {
                common,
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                assert_eq!(common.nonce, 7);
                assert_eq!(common.gas, 21_000);
                assert_eq!(common.first_seen, 100);
                assert_eq!(*max_fee_per_gas, 200_000_000_000);
                assert_eq!(*max_priority_fee_per_gas, 10_000_000_000);
            }
            other => panic!("expected dynamic-fee tx, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_maps_to_legacy() {
        let mut raw = raw_dynamic();
        raw.tx_type = Some("0x7e".into());
        raw.gas_price = Some("0x2e90edd000".into());
        let tx = raw.into_tx(0).unwrap();
        assert!(matches!(tx, Tx::Legacy { gas_price, .. } if gas_price == 200_000_000_000));
    }

    #[test]
    fn absent_type_maps_to_legacy() {
        let mut raw = raw_dynamic();
        raw.tx_type = None;
        raw.gas_price = Some("0x3b9aca00".into());
        assert!(matches!(raw.into_tx(0).unwrap(), Tx::Legacy { .. }));
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut raw = raw_dynamic();
        raw.max_fee_per_gas = None;
        let err = raw.into_tx(0).unwrap_err();
        assert_eq!(err.field, "maxFeePerGas");

        let err = RawTransaction::default().into_tx(0).unwrap_err();
        assert_eq!(err.field, "hash");
    }

    #[test]
    fn malformed_field_names_the_field() {
        let mut raw = raw_dynamic();
        raw.nonce = Some("0xnope".into());
        assert_eq!(raw.into_tx(0).unwrap_err().field, "nonce");
    }
}
