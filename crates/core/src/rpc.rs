//! JSON-RPC implementation of [`ChainSource`]: WebSocket subscriptions for
//! push events, HTTP for request calls. This is the only module that
//! touches wire JSON.

use crate::clock::Clock;
use crate::error::SourceError;
use crate::source::{ChainSource, HeadAnnouncement, SourceEvent};
use crate::state::MempoolSnapshot;
use alloy::primitives::Address;
use anyhow::Context;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use censorscope_config::constants::{BLOCK_FETCH_MAX_BACKOFF_SEC, BLOCK_FETCH_MIN_BACKOFF_MS};
use censorscope_config::MonitorConfig;
use censorscope_types::{
    format_hex_u64, parse_address, parse_hash, parse_hex_u64, parse_numeric_u64, BadPayload,
    Block, RawBlock, RawTransaction,
};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::WsClientBuilder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use url::Url;

pub struct RpcChainSource {
    http: HttpClient,
    ws_url: Url,
    events: mpsc::Sender<SourceEvent>,
    clock: Arc<dyn Clock>,
    mempool_fetch_interval: Duration,
    head_arrived: Notify,
}

impl RpcChainSource {
    pub fn new(
        config: &MonitorConfig,
        events: mpsc::Sender<SourceEvent>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let http = HttpClientBuilder::default()
            .build(config.http_rpc_url.as_str())
            .with_context(|| format!("building http client for {}", config.http_rpc_url))?;
        Ok(Self {
            http,
            ws_url: config.ws_rpc_url.clone(),
            events,
            clock,
            mempool_fetch_interval: config.mempool_fetch_interval(),
            head_arrived: Notify::new(),
        })
    }

    /// Forwards `newHeads` announcements to the engine and wakes the
    /// mempool fetcher. Returns `Ok` only when the engine hung up; a
    /// terminated subscription is an error (the supervisor restarts us).
    pub async fn run_head_subscription(&self) -> anyhow::Result<()> {
        let ws = WsClientBuilder::default()
            .build(self.ws_url.as_str())
            .await
            .context("connecting newHeads subscription")?;
        let mut heads: Subscription<Value> = ws
            .subscribe("eth_subscribe", rpc_params!["newHeads"], "eth_unsubscribe")
            .await
            .context("subscribing to newHeads")?;
        while let Some(header) = heads.next().await {
            let header = header.context("decoding newHeads item")?;
            let head = match parse_head(&header) {
                Ok(head) => head,
                Err(err) => {
                    tracing::warn!(%err, "dropping malformed head announcement");
                    continue;
                }
            };
            tracing::debug!(number = head.number, hash = %head.hash, "new head announced");
            if self.events.send(SourceEvent::NewHead(head)).await.is_err() {
                return Ok(());
            }
            self.head_arrived.notify_one();
        }
        anyhow::bail!("newHeads subscription terminated")
    }

    /// Forwards `newPendingTransactions` hashes, stamped with the local
    /// clock at receipt.
    pub async fn run_pending_subscription(&self) -> anyhow::Result<()> {
        let ws = WsClientBuilder::default()
            .build(self.ws_url.as_str())
            .await
            .context("connecting newPendingTransactions subscription")?;
        let mut hashes: Subscription<String> = ws
            .subscribe(
                "eth_subscribe",
                rpc_params!["newPendingTransactions"],
                "eth_unsubscribe",
            )
            .await
            .context("subscribing to newPendingTransactions")?;
        while let Some(item) = hashes.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(%err, "dropping undecodable pending announcement");
                    continue;
                }
            };
            let hash = match parse_hash("result", &raw) {
                Ok(hash) => hash,
                Err(err) => {
                    tracing::warn!(%err, "dropping malformed pending hash");
                    continue;
                }
            };
            let seen_at = self.clock.now();
            let event = SourceEvent::NewPendingHash { hash, seen_at };
            if self.events.send(event).await.is_err() {
                return Ok(());
            }
        }
        anyhow::bail!("newPendingTransactions subscription terminated")
    }

    /// Refreshes the mempool view a fixed delay after each new head,
    /// the cadence at which the pending pool settles post-block. Bursts of
    /// heads during a fetch coalesce into a single refresh.
    pub async fn run_mempool_fetcher(&self) -> anyhow::Result<()> {
        loop {
            self.head_arrived.notified().await;
            tokio::time::sleep(self.mempool_fetch_interval).await;
            let snapshot = match self.fetch_mempool().await {
                Ok(snapshot) => snapshot,
                Err(SourceError::Transient(err)) => {
                    tracing::warn!(%err, "mempool fetch failed, retrying after the next head");
                    continue;
                }
                Err(err) => return Err(err).context("fetching mempool"),
            };
            let total: usize = snapshot.values().map(BTreeMap::len).sum();
            tracing::debug!(senders = snapshot.len(), transactions = total, "mempool fetched");
            if self
                .events
                .send(SourceEvent::MempoolSnapshot(snapshot))
                .await
                .is_err()
            {
                return Ok(());
            }
        }
    }

    async fn fetch_mempool(&self) -> Result<MempoolSnapshot, SourceError> {
        let content: Value = self
            .http
            .request("txpool_content", rpc_params![])
            .await
            .map_err(|err| SourceError::Transient(anyhow::Error::new(err)))?;
        parse_mempool_content(&content, self.clock.now())
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn get_block_by_number(&self, number: u64) -> Result<Block, SourceError> {
        let fetch = || async {
            let raw: Option<RawBlock> = self
                .http
                .request(
                    "eth_getBlockByNumber",
                    rpc_params![format_hex_u64(number), true],
                )
                .await
                .map_err(|err| SourceError::Transient(anyhow::Error::new(err)))?;
            // A head can be announced before the node serves the block body;
            // a null result is just another transient miss.
            raw.ok_or_else(|| {
                SourceError::Transient(anyhow::anyhow!("block {number} not yet available"))
            })
        };
        let raw = fetch
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(BLOCK_FETCH_MIN_BACKOFF_MS))
                    .with_max_delay(Duration::from_secs(BLOCK_FETCH_MAX_BACKOFF_SEC))
                    .without_max_times(),
            )
            .when(SourceError::is_transient)
            .notify(|err, delay| {
                tracing::debug!(%err, retry_in = ?delay, "retrying block fetch");
            })
            .await?;
        Ok(raw.into_block(self.clock.now())?)
    }

    async fn get_nonce_at(&self, sender: Address, block_number: u64) -> Result<u64, SourceError> {
        let result: String = self
            .http
            .request(
                "eth_getTransactionCount",
                rpc_params![format!("{sender:#x}"), format_hex_u64(block_number)],
            )
            .await
            .map_err(|err| SourceError::Transient(anyhow::Error::new(err)))?;
        Ok(parse_hex_u64("result", &result)?)
    }
}

fn parse_head(header: &Value) -> Result<HeadAnnouncement, BadPayload> {
    let field = |name: &'static str| {
        header
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| BadPayload::missing(name))
    };
    Ok(HeadAnnouncement {
        number: parse_hex_u64("number", field("number")?)?,
        hash: parse_hash("hash", field("hash")?)?,
    })
}

/// Converts the `pending` partition of a `txpool_content` response into
/// typed bodies. Individually malformed entries are dropped; a response
/// without the partition altogether is unparseable schema and fatal.
fn parse_mempool_content(content: &Value, first_seen: u64) -> Result<MempoolSnapshot, SourceError> {
    let pending = content
        .get("pending")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            SourceError::Fatal(anyhow::anyhow!(
                "txpool_content response is missing the pending partition"
            ))
        })?;
    let mut snapshot = MempoolSnapshot::with_capacity(pending.len());
    let mut dropped = 0usize;
    for (sender_raw, by_nonce_raw) in pending {
        let Ok(sender) = parse_address("pending", sender_raw) else {
            dropped += 1;
            continue;
        };
        let Some(by_nonce_raw) = by_nonce_raw.as_object() else {
            dropped += 1;
            continue;
        };
        let mut by_nonce = BTreeMap::new();
        for (nonce_raw, body) in by_nonce_raw {
            let entry = parse_numeric_u64("nonce", nonce_raw).and_then(|nonce| {
                serde_json::from_value::<RawTransaction>(body.clone())
                    .map_err(|err| BadPayload::new("transaction", err.to_string()))
                    .and_then(|raw| raw.into_tx(first_seen))
                    .map(|tx| (nonce, tx))
            });
            match entry {
                Ok((nonce, tx)) => {
                    by_nonce.insert(nonce, tx);
                }
                Err(err) => {
                    dropped += 1;
                    tracing::debug!(%err, "dropping malformed mempool entry");
                }
            }
        }
        if !by_nonce.is_empty() {
            snapshot.insert(sender, by_nonce);
        }
    }
    if dropped > 0 {
        tracing::warn!(dropped, "dropped malformed mempool entries");
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn head_parses_number_and_hash() {
        let head = parse_head(&json!({
            "number": "0xed14f2",
            "hash": "0x1106290f5fff61aa181e26d9fcd985fed8404d35de2d448adb428a4501628cb3",
            "parentHash": "0x0b51c8d0ba5dd9e9f9773a241f6a0c20bdb58d8e37424b40da6196d99859ea7e",
            "timestamp": "0x6324a955"
        }))
        .unwrap();
        assert_eq!(head.number, 15_537_394);

        assert_eq!(parse_head(&json!({ "hash": "0x00" })).unwrap_err().field, "number");
    }

    #[test]
    fn mempool_content_keeps_decodable_pending_entries() {
        let content = json!({
            "pending": {
                "0x388c818ca8b9251b393131c08a736a67ccb19297": {
                    "17": {
                        "hash": "0x704ee73a7321961a12004b660ef943a1140079874b08d8f739658dc6c4b36241",
                        "from": "0x388c818ca8b9251b393131c08a736a67ccb19297",
                        "nonce": "0x11",
                        "gas": "0x5208",
                        "type": "0x2",
                        "maxFeePerGas": "0x2e90edd000",
                        "maxPriorityFeePerGas": "0x2540be400"
                    },
                    "18": { "hash": "0xnot-a-hash" }
                },
                "0xebec795c9c8bbd61ffc14a6662944748f299cacf": "garbage"
            },
            "queued": {}
        });
        let snapshot = parse_mempool_content(&content, 42).unwrap();
        assert_eq!(snapshot.len(), 1);
        let by_nonce = snapshot.values().next().unwrap();
        assert_eq!(by_nonce.len(), 1);
        let (nonce, tx) = by_nonce.iter().next().unwrap();
        assert_eq!(*nonce, 17);
        assert_eq!(tx.nonce(), 17);
        assert_eq!(tx.first_seen(), 42);
    }

    #[test]
    fn mempool_content_without_pending_partition_is_fatal() {
        let err = parse_mempool_content(&json!({ "queued": {} }), 0).unwrap_err();
        assert!(matches!(err, SourceError::Fatal(_)));
    }
}
