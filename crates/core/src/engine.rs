use crate::analyzer::CensorshipAnalyzer;
use crate::clock::Clock;
use crate::error::SourceError;
use crate::sink::Sink;
use crate::source::{ChainSource, HeadAnnouncement, SourceEvent};
use crate::state::ChainState;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Single-threaded event loop driving source events into [`ChainState`]
/// mutations and invoking the analyzer on every new head.
///
/// All events funnel through one bounded mailbox, so a mempool snapshot
/// arriving while a block is being processed is naturally queued and
/// applied afterwards.
pub struct Engine {
    events: mpsc::Receiver<SourceEvent>,
    source: Arc<dyn ChainSource>,
    sink: Arc<dyn Sink>,
    analyzer: CensorshipAnalyzer,
    clock: Arc<dyn Clock>,
    state: ChainState,
}

impl Engine {
    pub fn new(
        events: mpsc::Receiver<SourceEvent>,
        source: Arc<dyn ChainSource>,
        sink: Arc<dyn Sink>,
        analyzer: CensorshipAnalyzer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            source,
            sink,
            analyzer,
            clock,
            state: ChainState::new(),
        }
    }

    /// Drains the mailbox until every producer hangs up or a fatal error
    /// occurs. Sink writes are awaited in-line, so returning also means no
    /// write is left in flight.
    pub async fn run(mut self) -> anyhow::Result<()> {
        while let Some(event) = self.events.recv().await {
            self.handle(event).await?;
        }
        tracing::info!("event channel closed, engine shutting down");
        Ok(())
    }

    async fn handle(&mut self, event: SourceEvent) -> anyhow::Result<()> {
        match event {
            SourceEvent::NewPendingHash { hash, seen_at } => {
                self.state.note_pending_hash(hash, seen_at);
                Ok(())
            }
            SourceEvent::MempoolSnapshot(snapshot) => {
                self.state.apply_mempool_snapshot(snapshot, &*self.clock);
                tracing::debug!(pending = self.state.pending_len(), "mempool snapshot applied");
                Ok(())
            }
            SourceEvent::NewHead(head) => self.handle_new_head(head).await,
        }
    }

    async fn handle_new_head(&mut self, head: HeadAnnouncement) -> anyhow::Result<()> {
        tracing::debug!(number = head.number, hash = %head.hash, "processing new head");
        let block = match self.source.get_block_by_number(head.number).await {
            Ok(block) => block,
            Err(SourceError::BadPayload(err)) => {
                tracing::warn!(number = head.number, %err, "dropping undecodable block");
                return Ok(());
            }
            Err(err) => return Err(err).context("fetching announced block"),
        };
        if let Some(latest) = self.state.latest_block() {
            if block.parent_hash != latest.hash {
                // Reorgs are out of scope; analysis proceeds against the
                // head as reported.
                tracing::warn!(
                    number = block.number,
                    parent = %block.parent_hash,
                    last_seen = %latest.hash,
                    "block does not extend the last seen head"
                );
            }
        }

        let findings = self
            .analyzer
            .analyze(&block, &mut self.state, self.source.as_ref())
            .await;
        if !findings.is_empty() {
            tracing::info!(
                count = findings.len(),
                block = block.number,
                producer = %block.producer_id,
                "censorship findings persisted"
            );
        }
        for finding in &findings {
            self.sink
                .put_finding(finding)
                .await
                .context("persisting finding")?;
        }
        self.sink.put_block(&block).await.context("persisting block")?;
        for tx in &block.transactions {
            self.sink
                .put_transaction(tx)
                .await
                .context("persisting transaction")?;
        }
        self.state.apply_block(block);
        Ok(())
    }
}
