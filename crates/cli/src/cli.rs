use censorscope_config::constants::{
    DEFAULT_API_ADDR, DEFAULT_DB_PATH, DEFAULT_MEMPOOL_FETCH_INTERVAL_SEC,
    DEFAULT_NONCE_RPC_TIMEOUT_MS,
};
use censorscope_config::MonitorConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Watches an execution client for pending transactions that were
/// economically includable yet omitted by block producers, and records the
/// evidence per producer.
#[derive(Debug, Clone, Parser)]
#[command(name = "censorscope", version, about)]
pub struct Cli {
    /// HTTP JSON-RPC endpoint. The client must serve the Geth txpool API.
    #[arg(long, env = "CENSORSCOPE_HTTP_RPC_URL")]
    pub http_rpc_url: Url,

    /// WebSocket JSON-RPC endpoint used for subscriptions.
    #[arg(long, env = "CENSORSCOPE_WS_RPC_URL")]
    pub ws_rpc_url: Url,

    /// SQLite database file, created on first run.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Bind address of the read-only query API.
    #[arg(long, default_value = DEFAULT_API_ADDR)]
    pub api_addr: SocketAddr,

    /// Seconds between a new head and the next mempool refresh.
    #[arg(long, default_value_t = DEFAULT_MEMPOOL_FETCH_INTERVAL_SEC)]
    pub mempool_fetch_interval: u16,

    /// Milliseconds allowed for a nonce lookup during analysis before the
    /// sender is treated as not ready.
    #[arg(long, default_value_t = DEFAULT_NONCE_RPC_TIMEOUT_MS)]
    pub nonce_timeout_ms: u16,
}

impl Cli {
    pub fn into_config(self) -> MonitorConfig {
        MonitorConfig::new(self.http_rpc_url, self.ws_rpc_url)
            .with_db_path(self.db_path)
            .with_api_addr(self.api_addr)
            .with_mempool_fetch_interval_sec(self.mempool_fetch_interval)
            .with_nonce_rpc_timeout_ms(self.nonce_timeout_ms)
    }
}
