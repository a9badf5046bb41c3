use crate::error::SourceError;
use crate::state::MempoolSnapshot;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use censorscope_types::Block;

/// A new canonical head, reduced to what the engine needs in order to
/// fetch the full block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadAnnouncement {
    pub number: u64,
    pub hash: B256,
}

/// Events pushed by a chain source into the engine mailbox.
///
/// Heads from a single source arrive monotonically by number (reorgs are
/// not modeled); pending hashes may be duplicated, and no ordering holds
/// between a pending hash and the block that eventually includes it.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    NewHead(HeadAnnouncement),
    NewPendingHash { hash: B256, seen_at: u64 },
    MempoolSnapshot(MempoolSnapshot),
}

/// Normalized view of an execution client. Implementations own the wire
/// format and its retries; the engine only ever sees typed values.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Full block with transaction bodies. Implementations retry transient
    /// misses (a head announced before the block is served) with bounded
    /// exponential backoff until the block exists.
    async fn get_block_by_number(&self, number: u64) -> Result<Block, SourceError>;

    /// Confirmed transaction count of `sender` as of `block_number`.
    async fn get_nonce_at(&self, sender: Address, block_number: u64) -> Result<u64, SourceError>;
}
