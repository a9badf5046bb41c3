use async_trait::async_trait;
use censorscope_types::{Block, Finding, Tx};

/// Write-only persistence for observed chain data.
///
/// Implementations are idempotent by primary key: re-observing the same
/// block, transaction or finding after a restart is silently ignored. A
/// returned error is fatal to the engine.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn put_block(&self, block: &Block) -> anyhow::Result<()>;
    async fn put_transaction(&self, tx: &Tx) -> anyhow::Result<()>;
    async fn put_finding(&self, finding: &Finding) -> anyhow::Result<()>;
}
