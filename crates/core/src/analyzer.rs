use crate::error::SourceError;
use crate::fee;
use crate::source::ChainSource;
use crate::state::ChainState;
use censorscope_config::BaseFeeHeadroom;
use censorscope_types::{Block, Finding};
use std::time::Duration;

/// The per-block inclusion-eligibility test.
///
/// Given a newly canonical block and the current chain state, reports
/// every pending transaction that was visible, economically includable
/// and next in its sender's nonce sequence, yet omitted by the block
/// producer. Total over well-typed inputs: an unanswerable nonce lookup
/// is a negative answer, not an error.
pub struct CensorshipAnalyzer {
    base_fee_headroom: BaseFeeHeadroom,
    nonce_timeout: Duration,
}

impl CensorshipAnalyzer {
    pub fn new(base_fee_headroom: BaseFeeHeadroom, nonce_timeout: Duration) -> Self {
        Self {
            base_fee_headroom,
            nonce_timeout,
        }
    }

    /// Runs the eligibility predicates over a snapshot of the pending set
    /// taken at entry. Matching transactions are reported as findings and
    /// have `block.number` appended to their censorship history in state.
    ///
    /// Finding order follows the pending-set iteration order at entry:
    /// stable for a fixed input state, otherwise unspecified.
    pub async fn analyze(
        &self,
        block: &Block,
        state: &mut ChainState,
        source: &dyn ChainSource,
    ) -> Vec<Finding> {
        // Visibility is judged against the previous head: a transaction can
        // only have been censored if it was already public when the producer
        // started building. With no previous head there is nothing to judge.
        let Some(previous_timestamp) = state.latest_block().map(|b| b.timestamp) else {
            return Vec::new();
        };
        let min_priority_fee = fee::block_min_priority_fee(block);
        let base_fee_floor = self.base_fee_headroom.apply(block.base_fee_per_gas);
        let gas_room = block.gas_limit.saturating_sub(block.gas_used);

        let candidates: Vec<_> = state.pending().values().map(|p| p.tx.clone()).collect();
        let mut findings = Vec::new();
        for tx in candidates {
            if previous_timestamp < tx.first_seen() {
                continue;
            }
            // Tie goes to includable.
            if fee::effective_priority_fee(&tx, block.base_fee_per_gas) < min_priority_fee {
                continue;
            }
            // The producer is only on the hook for transactions that could
            // also have survived near-term base-fee escalation.
            if fee::max_base_fee_payable(&tx) < base_fee_floor {
                continue;
            }
            if tx.gas() > gas_room {
                continue;
            }
            let sender = tx.sender();
            let next_nonce = state
                .get_or_fetch_nonce(sender, || async {
                    let lookup = source.get_nonce_at(sender, block.number.saturating_sub(1));
                    tokio::time::timeout(self.nonce_timeout, lookup)
                        .await
                        .map_err(|_| {
                            SourceError::Transient(anyhow::anyhow!("nonce lookup timed out"))
                        })?
                })
                .await;
            let next_nonce = match next_nonce {
                Ok(nonce) => nonce,
                Err(err) => {
                    tracing::warn!(
                        %sender,
                        %err,
                        "nonce unresolved, treating sender as not ready"
                    );
                    continue;
                }
            };
            // A gap ahead of the transaction means it is queued, not censored.
            if next_nonce != tx.nonce() {
                continue;
            }

            tracing::info!(
                hash = %tx.hash(),
                block = block.number,
                producer = %block.producer_id,
                first_seen = tx.first_seen(),
                "censored transaction detected"
            );
            state.record_censored(tx.hash(), block.number);
            findings.push(Finding {
                tx_hash: tx.hash(),
                block_number: block.number,
                block_hash: block.hash,
                producer_id: block.producer_id.clone(),
                seen_at: tx.first_seen(),
            });
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PendingTx;
    use crate::testing::{dynamic_tx, legacy_tx, BlockBuilder, StaticSource, TxBuilder, GWEI};
    use censorscope_types::Tx;
    use maplit::hashmap;
    use std::sync::atomic::Ordering;

    fn analyzer() -> CensorshipAnalyzer {
        CensorshipAnalyzer::new(BaseFeeHeadroom::default(), Duration::from_secs(10))
    }

    /// Pending tx every predicate accepts against `omitting_block`: nonce 7,
    /// max fee 200 gwei, tip 10 gwei, first seen at t=100.
    fn pending_t_a() -> Tx {
        TxBuilder::new(1)
            .nonce(7)
            .first_seen(100)
            .dynamic(200 * GWEI, 10 * GWEI)
    }

    /// State whose previous head was at t=200 and whose nonce cache already
    /// holds the pending sender at its transaction's nonce.
    fn ready_state(pending: Tx) -> ChainState {
        let mut state = ChainState::new();
        let confirmed = TxBuilder::new(100)
            .sender(pending.sender())
            .nonce(pending.nonce())
            .legacy(150 * GWEI);
        state.apply_block(
            BlockBuilder::new(99)
                .timestamp(200)
                .txs(vec![confirmed])
                .build(),
        );
        state.insert_pending(PendingTx::new(pending));
        state
    }

    /// A block paying at least 10 gwei of tip in every slot, from producers
    /// unrelated to the pending sender.
    fn omitting_block(number: u64) -> Block {
        BlockBuilder::new(number)
            .base_fee(100 * GWEI)
            .txs(vec![
                dynamic_tx(50, 200 * GWEI, 10 * GWEI),
                legacy_tx(51, 112 * GWEI),
            ])
            .build()
    }

    #[tokio::test]
    async fn clear_cut_censorship_is_reported() {
        let t_a = pending_t_a();
        let mut state = ready_state(t_a.clone());
        let source = StaticSource::default();
        let block = omitting_block(100);

        let findings = analyzer().analyze(&block, &mut state, &source).await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.tx_hash, t_a.hash());
        assert_eq!(finding.block_number, block.number);
        assert_eq!(finding.block_hash, block.hash);
        assert_eq!(finding.producer_id, block.producer_id);
        assert_eq!(finding.seen_at, 100);
        assert_eq!(state.pending()[&t_a.hash()].censored_blocks, vec![100]);
        // The cached nonce made the RPC fallback unnecessary.
        assert_eq!(source.nonce_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn insufficient_base_fee_headroom_is_not_censorship() {
        // max_base_fee_payable = 149 - 10 = 139 gwei < 150 gwei floor.
        let t_a = TxBuilder::new(1)
            .nonce(7)
            .first_seen(100)
            .dynamic(149 * GWEI, 10 * GWEI);
        let mut state = ready_state(t_a);
        let source = StaticSource::default();

        let findings = analyzer()
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn nonce_gap_is_not_censorship() {
        let t_a = pending_t_a();
        let sender = t_a.sender();
        let mut state = ChainState::new();
        // Previous head confirmed the sender only up to nonce 5.
        let confirmed = TxBuilder::new(100).sender(sender).nonce(5).legacy(150 * GWEI);
        state.apply_block(
            BlockBuilder::new(99)
                .timestamp(200)
                .txs(vec![confirmed])
                .build(),
        );
        state.insert_pending(PendingTx::new(t_a));
        let source = StaticSource::default();

        let findings = analyzer()
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert!(findings.is_empty());
        assert_eq!(state.nonce(&sender), Some(5));
    }

    #[tokio::test]
    async fn tip_below_block_floor_is_not_censorship() {
        // Legacy tx paying 5 gwei of tip against a block whose cheapest slot
        // paid 8 gwei.
        let t_a = TxBuilder::new(1).nonce(7).first_seen(100).legacy(105 * GWEI);
        let mut state = ready_state(t_a);
        let source = StaticSource::default();
        let block = BlockBuilder::new(100)
            .base_fee(100 * GWEI)
            .txs(vec![legacy_tx(51, 108 * GWEI)])
            .build();

        let findings = analyzer().analyze(&block, &mut state, &source).await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn transaction_seen_after_previous_head_is_not_censorship() {
        let t_a = TxBuilder::new(1)
            .nonce(7)
            .first_seen(500) // previous head was at t=200
            .dynamic(200 * GWEI, 10 * GWEI);
        let mut state = ready_state(t_a);
        let source = StaticSource::default();

        let findings = analyzer()
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn no_gas_room_is_not_censorship() {
        let t_a = pending_t_a();
        let mut state = ready_state(t_a);
        let source = StaticSource::default();
        let block = BlockBuilder::new(100)
            .base_fee(100 * GWEI)
            .gas_limit(30_000_000)
            .gas_used(29_990_000)
            .txs(vec![dynamic_tx(50, 200 * GWEI, 10 * GWEI)])
            .build();

        let findings = analyzer().analyze(&block, &mut state, &source).await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn without_previous_head_nothing_is_judged() {
        let mut state = ChainState::new();
        state.insert_pending(PendingTx::new(pending_t_a()));
        let source = StaticSource::default();

        let findings = analyzer()
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn repeated_omission_accumulates() {
        let t_a = pending_t_a();
        let mut state = ready_state(t_a.clone());
        let source = StaticSource::default();

        let b1 = omitting_block(100);
        let first = analyzer().analyze(&b1, &mut state, &source).await;
        assert_eq!(first.len(), 1);

        let b2 = omitting_block(101);
        let second = analyzer().analyze(&b2, &mut state, &source).await;
        assert_eq!(second.len(), 1);

        assert_eq!(
            state.pending()[&t_a.hash()].censored_blocks,
            vec![b1.number, b2.number]
        );
    }

    #[tokio::test]
    async fn unknown_sender_nonce_is_fetched_once_and_cached() {
        let t_a = pending_t_a();
        let sender = t_a.sender();
        let mut state = ChainState::new();
        state.apply_block(BlockBuilder::new(99).timestamp(200).build());
        state.insert_pending(PendingTx::new(t_a.clone()));
        let source = StaticSource::with_nonces(hashmap! { sender => 7 });

        let findings = analyzer()
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert_eq!(findings.len(), 1);
        assert_eq!(source.nonce_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.nonce(&sender), Some(7));

        // A second block reuses the cache.
        let findings = analyzer()
            .analyze(&omitting_block(101), &mut state, &source)
            .await;
        assert_eq!(findings.len(), 1);
        assert_eq!(source.nonce_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_nonce_lookup_reads_as_not_ready() {
        let t_a = pending_t_a();
        let sender = t_a.sender();
        let mut state = ChainState::new();
        state.apply_block(BlockBuilder::new(99).timestamp(200).build());
        state.insert_pending(PendingTx::new(t_a));
        let source = StaticSource {
            stall_nonce_lookups: true,
            ..StaticSource::with_nonces(hashmap! { sender => 7 })
        };
        let analyzer =
            CensorshipAnalyzer::new(BaseFeeHeadroom::default(), Duration::from_millis(20));

        let findings = analyzer
            .analyze(&omitting_block(100), &mut state, &source)
            .await;
        assert!(findings.is_empty());
        // The timeout must not poison the cache with a guess.
        assert_eq!(state.nonce(&sender), None);
    }

    #[tokio::test]
    async fn omitting_an_empty_block_still_counts() {
        // An empty block has a zero tip floor, so the fee predicates reduce
        // to the headroom check alone.
        let t_a = pending_t_a();
        let mut state = ready_state(t_a.clone());
        let source = StaticSource::default();
        let block = BlockBuilder::new(100).base_fee(100 * GWEI).build();

        let findings = analyzer().analyze(&block, &mut state, &source).await;
        assert_eq!(findings.len(), 1);
    }
}
