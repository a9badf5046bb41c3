//! Pure fee arithmetic over EIP-1559 and legacy fee fields. All values are
//! wei per gas.

use censorscope_types::{Block, Tx};

/// The tip a transaction would actually pay to the producer of a block
/// whose base fee is `base_fee`.
///
/// A dynamic-fee transaction pays `min(max_priority, max_fee - base_fee)`;
/// a legacy one pays everything above the base fee. Both saturate at zero,
/// where the transaction is not includable anyway.
pub fn effective_priority_fee(tx: &Tx, base_fee: u128) -> u128 {
    match tx {
        Tx::Legacy { gas_price, .. } => gas_price.saturating_sub(base_fee),
        Tx::DynamicFee {
            max_fee_per_gas,
            max_priority_fee_per_gas,
            ..
        } => (*max_priority_fee_per_gas).min(max_fee_per_gas.saturating_sub(base_fee)),
    }
}

/// The highest base fee the transaction can absorb while still paying its
/// full tip.
pub fn max_base_fee_payable(tx: &Tx) -> u128 {
    match tx {
        Tx::Legacy { gas_price, .. } => *gas_price,
        Tx::DynamicFee {
            max_fee_per_gas,
            max_priority_fee_per_gas,
            ..
        } => max_fee_per_gas.saturating_sub(*max_priority_fee_per_gas),
    }
}

/// The minimum effective tip across the block's transactions; zero only
/// for an empty block.
pub fn block_min_priority_fee(block: &Block) -> u128 {
    block
        .transactions
        .iter()
        .map(|tx| effective_priority_fee(tx, block.base_fee_per_gas))
        .min()
        .unwrap_or(0)
}
