//! Configuration for the censorship monitor.

pub mod constants;

use constants::{
    DEFAULT_API_ADDR, DEFAULT_BASE_FEE_HEADROOM, DEFAULT_DB_PATH,
    DEFAULT_MEMPOOL_FETCH_INTERVAL_SEC, DEFAULT_NONCE_RPC_TIMEOUT_MS,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Rational safety margin applied to a block's base fee when deciding
/// whether an omitted transaction could also have absorbed near-term
/// base-fee escalation. Applied with floor division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseFeeHeadroom {
    pub numerator: u128,
    pub denominator: u128,
}

impl BaseFeeHeadroom {
    /// `base_fee * numerator / denominator`, rounded down. Overflow here
    /// means the caller fed an unvalidated base fee and is a programmer
    /// error, not a recoverable fault.
    pub fn apply(&self, base_fee: u128) -> u128 {
        base_fee
            .checked_mul(self.numerator)
            .expect("base fee headroom multiplication overflowed")
            / self.denominator
    }
}

impl Default for BaseFeeHeadroom {
    fn default() -> Self {
        let (numerator, denominator) = DEFAULT_BASE_FEE_HEADROOM;
        Self {
            numerator,
            denominator,
        }
    }
}

/// Top-level monitor configuration. Built from CLI arguments; the
/// `with_*` setters exist so tests and embedders can override defaults
/// piecemeal.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// HTTP JSON-RPC endpoint used for request calls.
    pub http_rpc_url: Url,
    /// WebSocket JSON-RPC endpoint used for subscriptions.
    pub ws_rpc_url: Url,
    pub db_path: PathBuf,
    /// Bind address of the read-only query API.
    pub api_addr: SocketAddr,
    pub mempool_fetch_interval_sec: u16,
    pub nonce_rpc_timeout_ms: u16,
    pub base_fee_headroom: BaseFeeHeadroom,
}

impl MonitorConfig {
    pub fn new(http_rpc_url: Url, ws_rpc_url: Url) -> Self {
        Self {
            http_rpc_url,
            ws_rpc_url,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            api_addr: DEFAULT_API_ADDR
                .parse()
                .expect("default api addr is well-formed"),
            mempool_fetch_interval_sec: DEFAULT_MEMPOOL_FETCH_INTERVAL_SEC,
            nonce_rpc_timeout_ms: DEFAULT_NONCE_RPC_TIMEOUT_MS,
            base_fee_headroom: BaseFeeHeadroom::default(),
        }
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_api_addr(mut self, api_addr: SocketAddr) -> Self {
        self.api_addr = api_addr;
        self
    }

    pub fn with_mempool_fetch_interval_sec(mut self, seconds: u16) -> Self {
        self.mempool_fetch_interval_sec = seconds;
        self
    }

    pub fn with_nonce_rpc_timeout_ms(mut self, millis: u16) -> Self {
        self.nonce_rpc_timeout_ms = millis;
        self
    }

    pub fn with_base_fee_headroom(mut self, headroom: BaseFeeHeadroom) -> Self {
        self.base_fee_headroom = headroom;
        self
    }

    pub fn mempool_fetch_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.mempool_fetch_interval_sec))
    }

    pub fn nonce_rpc_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.nonce_rpc_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headroom_floors() {
        let headroom = BaseFeeHeadroom::default();
        assert_eq!(headroom.apply(100), 150);
        assert_eq!(headroom.apply(101), 151); // 303 / 2 rounded down
        assert_eq!(headroom.apply(0), 0);
    }

    #[test]
    fn defaults() {
        let config = MonitorConfig::new(
            "http://localhost:8545".parse().unwrap(),
            "ws://localhost:8546".parse().unwrap(),
        );
        assert_eq!(config.mempool_fetch_interval(), Duration::from_secs(6));
        assert_eq!(config.nonce_rpc_timeout(), Duration::from_secs(10));
        assert_eq!(config.db_path, PathBuf::from("censorscope.db"));
    }
}
