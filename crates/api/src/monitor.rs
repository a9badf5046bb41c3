use censorscope_config::constants::API_RECENT_LIMIT;
use censorscope_core::Clock;
use censorscope_db::{BlockRow, Database, Stats, TransactionRow, ValidatorRow};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorCode, ErrorObjectOwned};
use std::sync::Arc;

#[rpc(server, namespace = "monitor")]
pub trait MonitorNamespace {
    /// Counts of blocks, transactions and distinct producers observed in
    /// the trailing 24 hours.
    #[method(name = "stats")]
    async fn stats(&self) -> RpcResult<Stats>;

    #[method(name = "recentBlocks")]
    async fn recent_blocks(&self) -> RpcResult<Vec<BlockRow>>;

    #[method(name = "recentTransactions")]
    async fn recent_transactions(&self) -> RpcResult<Vec<TransactionRow>>;

    /// Per producer with findings, the most recent block in which they
    /// omitted an includable transaction.
    #[method(name = "validators")]
    async fn validators(&self) -> RpcResult<Vec<ValidatorRow>>;
}

pub struct MonitorNamespace {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl MonitorNamespace {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

#[async_trait]
impl MonitorNamespaceServer for MonitorNamespace {
    async fn stats(&self) -> RpcResult<Stats> {
        self.db.stats(self.clock.now()).map_err(internal_error)
    }

    async fn recent_blocks(&self) -> RpcResult<Vec<BlockRow>> {
        self.db
            .recent_blocks(API_RECENT_LIMIT)
            .map_err(internal_error)
    }

    async fn recent_transactions(&self) -> RpcResult<Vec<TransactionRow>> {
        self.db
            .recent_transactions(API_RECENT_LIMIT)
            .map_err(internal_error)
    }

    async fn validators(&self) -> RpcResult<Vec<ValidatorRow>> {
        self.db
            .validators_with_last_censored()
            .map_err(internal_error)
    }
}

fn internal_error(err: anyhow::Error) -> ErrorObjectOwned {
    tracing::error!(%err, "api query failed");
    ErrorObjectOwned::owned(ErrorCode::InternalError.code(), "internal error", None::<()>)
}
