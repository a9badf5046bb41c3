//! Fixture builders and mock collaborators shared by the unit tests.

#![cfg(test)]

use crate::clock::Clock;
use crate::error::SourceError;
use crate::sink::Sink;
use crate::source::ChainSource;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use censorscope_types::{Block, Finding, Tx, TxCommon};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const GWEI: u128 = 1_000_000_000;

pub fn addr(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

pub fn hash(seed: u8) -> B256 {
    B256::repeat_byte(seed)
}

/// Deterministic transaction fixture. The seed fixes the hash and, unless
/// overridden, the sender.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    hash: B256,
    sender: Address,
    nonce: u64,
    gas: u64,
    first_seen: u64,
}

impl TxBuilder {
    pub fn new(seed: u8) -> Self {
        Self {
            hash: hash(seed),
            sender: addr(seed),
            nonce: 0,
            gas: 21_000,
            first_seen: 0,
        }
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn first_seen(mut self, first_seen: u64) -> Self {
        self.first_seen = first_seen;
        self
    }

    fn common(self) -> TxCommon {
        TxCommon {
            hash: self.hash,
            sender: self.sender,
            nonce: self.nonce,
            gas: self.gas,
            first_seen: self.first_seen,
        }
    }

    pub fn legacy(self, gas_price: u128) -> Tx {
        Tx::Legacy {
            common: self.common(),
            gas_price,
        }
    }

    pub fn dynamic(self, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Tx {
        Tx::DynamicFee {
            common: self.common(),
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }
}

pub fn legacy_tx(seed: u8, gas_price: u128) -> Tx {
    TxBuilder::new(seed).legacy(gas_price)
}

pub fn dynamic_tx(seed: u8, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Tx {
    TxBuilder::new(seed).dynamic(max_fee_per_gas, max_priority_fee_per_gas)
}

/// Deterministic block fixture: hash derived from the number, parent hash
/// from the previous number, roomy gas defaults.
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    number: u64,
    timestamp: u64,
    base_fee_per_gas: u128,
    gas_limit: u64,
    gas_used: u64,
    producer_id: String,
    transactions: Vec<Tx>,
}

impl BlockBuilder {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            timestamp: 200,
            base_fee_per_gas: 100 * GWEI,
            gas_limit: 30_000_000,
            gas_used: 15_000_000,
            producer_id: "0xfacade".to_string(),
            transactions: Vec::new(),
        }
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn base_fee(mut self, base_fee_per_gas: u128) -> Self {
        self.base_fee_per_gas = base_fee_per_gas;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn gas_used(mut self, gas_used: u64) -> Self {
        self.gas_used = gas_used;
        self
    }

    pub fn txs(mut self, transactions: Vec<Tx>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn build(self) -> Block {
        Block {
            number: self.number,
            hash: block_hash(self.number),
            parent_hash: block_hash(self.number.wrapping_sub(1)),
            timestamp: self.timestamp,
            base_fee_per_gas: self.base_fee_per_gas,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            producer_id: self.producer_id,
            transactions: self.transactions,
        }
    }
}

fn block_hash(number: u64) -> B256 {
    let mut bytes = [0xb0u8; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

pub fn block_with_txs(base_fee_per_gas: u128, transactions: Vec<Tx>) -> Block {
    BlockBuilder::new(1)
        .base_fee(base_fee_per_gas)
        .txs(transactions)
        .build()
}

/// Clock whose reading the test sets explicitly.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Canned [`ChainSource`]: serves blocks and nonces from maps, counting
/// nonce lookups; optionally never answers them at all.
#[derive(Debug, Default)]
pub struct StaticSource {
    pub blocks: HashMap<u64, Block>,
    pub nonces: HashMap<Address, u64>,
    pub nonce_calls: AtomicUsize,
    pub stall_nonce_lookups: bool,
}

impl StaticSource {
    pub fn with_nonces(nonces: HashMap<Address, u64>) -> Self {
        Self {
            nonces,
            ..Self::default()
        }
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (b.number, b)).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChainSource for StaticSource {
    async fn get_block_by_number(&self, number: u64) -> Result<Block, SourceError> {
        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| SourceError::Fatal(anyhow::anyhow!("no canned block {number}")))
    }

    async fn get_nonce_at(&self, sender: Address, _block_number: u64) -> Result<u64, SourceError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_nonce_lookups {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        self.nonces
            .get(&sender)
            .copied()
            .ok_or_else(|| SourceError::Transient(anyhow::anyhow!("no canned nonce for {sender}")))
    }
}

/// [`Sink`] that records every write for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub blocks: Mutex<Vec<Block>>,
    pub transactions: Mutex<Vec<Tx>>,
    pub findings: Mutex<Vec<Finding>>,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn put_block(&self, block: &Block) -> anyhow::Result<()> {
        self.blocks.lock().unwrap().push(block.clone());
        Ok(())
    }

    async fn put_transaction(&self, tx: &Tx) -> anyhow::Result<()> {
        self.transactions.lock().unwrap().push(tx.clone());
        Ok(())
    }

    async fn put_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        self.findings.lock().unwrap().push(finding.clone());
        Ok(())
    }
}
