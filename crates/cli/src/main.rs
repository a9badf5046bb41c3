use crate::cli::Cli;
use anyhow::Context;
use censorscope_config::constants::EVENT_CHANNEL_CAPACITY;
use censorscope_core::{CensorshipAnalyzer, Clock, Engine, RpcChainSource, SystemClock};
use censorscope_db::Database;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!(
        http = %config.http_rpc_url,
        ws = %config.ws_rpc_url,
        "starting censorship monitor"
    );

    let db = Database::open(&config.db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let api = censorscope_api::serve(config.api_addr, db.clone(), clock.clone()).await?;
    tracing::info!(addr = %config.api_addr, "query api listening");

    let (events, mailbox) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let source = Arc::new(RpcChainSource::new(&config, events, clock.clone())?);
    let analyzer = CensorshipAnalyzer::new(config.base_fee_headroom, config.nonce_rpc_timeout());
    let engine = Engine::new(
        mailbox,
        source.clone(),
        Arc::new(db),
        analyzer,
        clock,
    );

    let heads = tokio::spawn({
        let source = source.clone();
        async move { source.run_head_subscription().await }
    });
    let pending = tokio::spawn({
        let source = source.clone();
        async move { source.run_pending_subscription().await }
    });
    let mempool = tokio::spawn({
        let source = source.clone();
        async move { source.run_mempool_fetcher().await }
    });
    let engine = tokio::spawn(engine.run());

    // First terminating task wins; everything else is torn down with the
    // process. The engine awaits its sink writes in-line, so no write is
    // in flight once its future resolves.
    let result = tokio::select! {
        res = engine => res.context("engine task panicked")?,
        res = heads => res.context("head subscription task panicked")?,
        res = pending => res.context("pending subscription task panicked")?,
        res = mempool => res.context("mempool fetcher task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };
    if api.stop().is_ok() {
        api.stopped().await;
    }
    result
}
