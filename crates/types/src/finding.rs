use alloy::primitives::B256;

/// Evidence that a block producer omitted a pending transaction that was
/// economically and structurally includable in their block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub tx_hash: B256,
    pub block_number: u64,
    pub block_hash: B256,
    pub producer_id: String,
    /// First-seen timestamp of the omitted transaction.
    pub seen_at: u64,
}
