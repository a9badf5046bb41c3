use crate::clock::Clock;
use crate::error::SourceError;
use alloy::primitives::{Address, B256};
use censorscope_types::{Block, Tx};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

/// A transaction the monitor currently believes to be pending, together
/// with the blocks that have omitted it while it was includable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub tx: Tx,
    pub censored_blocks: Vec<u64>,
}

impl PendingTx {
    pub fn new(tx: Tx) -> Self {
        Self {
            tx,
            censored_blocks: Vec::new(),
        }
    }
}

/// The `pending` partition of the execution client's transaction pool,
/// keyed by sender and nonce.
pub type MempoolSnapshot = HashMap<Address, BTreeMap<u64, Tx>>;

/// In-memory reconciliation state between mempool observations and
/// canonical blocks. Single-owner: only the engine loop mutates it, so no
/// internal locking.
#[derive(Debug, Default)]
pub struct ChainState {
    /// Transactions currently believed to be in the mempool.
    pending: HashMap<B256, PendingTx>,
    /// Highest confirmed nonce per sender; the canonical next-expected
    /// nonce reference. Non-decreasing across block arrivals.
    nonces: HashMap<Address, u64>,
    /// First-seen timestamps for hashes announced before their bodies
    /// arrived. Short-lived: drained on body arrival or block inclusion.
    timestamps: HashMap<B256, u64>,
    latest_block: Option<Block>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the first sighting of an announced hash whose body is not
    /// yet known. Duplicate announcements keep the earliest sighting; a
    /// hash that already has a pending body is ignored.
    pub fn note_pending_hash(&mut self, hash: B256, seen_at: u64) {
        if self.pending.contains_key(&hash) {
            return;
        }
        self.timestamps.entry(hash).or_insert(seen_at);
    }

    /// Rebuilds the pending set from a fresh mempool snapshot, keeping only
    /// each sender's next-to-include (minimum nonce) slot.
    ///
    /// A body already tracked as pending carries its record over unchanged,
    /// first sighting and censorship history included. A new body resolves
    /// its first sighting from the announced-hash timestamps, falling back
    /// to the clock. Everything absent from the snapshot is evicted.
    pub fn apply_mempool_snapshot(&mut self, snapshot: MempoolSnapshot, clock: &dyn Clock) {
        let mut next = HashMap::with_capacity(snapshot.len());
        for (_, by_nonce) in snapshot {
            let Some((_, mut tx)) = by_nonce.into_iter().next() else {
                continue;
            };
            let hash = tx.hash();
            if let Some(prev) = self.pending.remove(&hash) {
                next.insert(hash, prev);
            } else {
                let first_seen = self.timestamps.remove(&hash).unwrap_or_else(|| clock.now());
                tx.set_first_seen(first_seen);
                next.insert(hash, PendingTx::new(tx));
            }
        }
        self.pending = next;
    }

    /// Digests a canonical block: advances per-sender nonces and drops
    /// every pending entry whose sender had any transaction included (its
    /// next-slot nonce is now stale, or it was the one included).
    pub fn apply_block(&mut self, block: Block) {
        let mut included_senders = HashSet::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let nonce = self.nonces.entry(tx.sender()).or_default();
            *nonce = (*nonce).max(tx.nonce());
            included_senders.insert(tx.sender());
            self.timestamps.remove(&tx.hash());
        }
        self.pending
            .retain(|_, pending| !included_senders.contains(&pending.tx.sender()));
        self.latest_block = Some(block);
    }

    /// Cached next-expected nonce for `sender`, falling back to `fetch`
    /// and caching its result. A failed fetch caches nothing.
    pub async fn get_or_fetch_nonce<F, Fut>(
        &mut self,
        sender: Address,
        fetch: F,
    ) -> Result<u64, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, SourceError>>,
    {
        if let Some(nonce) = self.nonces.get(&sender) {
            return Ok(*nonce);
        }
        let nonce = fetch().await?;
        self.nonces.insert(sender, nonce);
        Ok(nonce)
    }

    /// Marks a still-pending transaction as omitted by `block_number`.
    pub fn record_censored(&mut self, hash: B256, block_number: u64) {
        if let Some(pending) = self.pending.get_mut(&hash) {
            pending.censored_blocks.push(block_number);
        }
    }

    pub fn pending(&self) -> &HashMap<B256, PendingTx> {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.latest_block.as_ref()
    }

    pub fn nonce(&self, sender: &Address) -> Option<u64> {
        self.nonces.get(sender).copied()
    }

    #[cfg(test)]
    pub(crate) fn insert_pending(&mut self, pending: PendingTx) {
        self.pending.insert(pending.tx.hash(), pending);
    }
}
