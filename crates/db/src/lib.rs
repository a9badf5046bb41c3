//! SQLite persistence: an insert-or-ignore write path used by the engine
//! sink plus a separate read-only connection serving the query API. One
//! writer (the engine), any number of readers tolerating non-repeatable
//! reads.

use anyhow::Context;
use async_trait::async_trait;
use censorscope_core::Sink;
use censorscope_types::{Block, Finding, Tx};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS blocks(
    block_number INTEGER PRIMARY KEY,
    hash         TEXT NOT NULL,
    producer_id  TEXT NOT NULL,
    timestamp    INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS transactions(
    hash       TEXT PRIMARY KEY,
    first_seen INTEGER NOT NULL,
    sender     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS findings(
    block_number INTEGER NOT NULL,
    tx_hash      TEXT NOT NULL,
    producer_id  TEXT NOT NULL,
    seen_at      INTEGER NOT NULL,
    PRIMARY KEY (block_number, tx_hash)
);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRow {
    pub block_number: u64,
    pub hash: String,
    pub producer_id: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRow {
    pub hash: String,
    pub first_seen: u64,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorRow {
    pub producer_id: String,
    /// Hash of the most recent block in which this producer omitted an
    /// includable transaction.
    pub last_censored_block: String,
}

/// Counts over the trailing 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub num_blocks: u64,
    pub num_transactions: u64,
    pub num_validators: u64,
}

/// Handle over one writable and one read-only connection to the same
/// database file. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    write: Arc<Mutex<Connection>>,
    read: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database, creating the file and schema when absent.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        tracing::info!(path = %path.display(), "opening database");
        let write = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        write.execute_batch(SCHEMA).context("applying schema")?;
        let read = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .context("opening read-only connection")?;
        Ok(Self {
            write: Arc::new(Mutex::new(write)),
            read: Arc::new(Mutex::new(read)),
        })
    }

    fn write(&self) -> MutexGuard<'_, Connection> {
        self.write.lock().expect("database write lock is poisoned")
    }

    fn read(&self) -> MutexGuard<'_, Connection> {
        self.read.lock().expect("database read lock is poisoned")
    }

    pub fn insert_block(&self, block: &Block) -> anyhow::Result<()> {
        self.write()
            .execute(
                "INSERT OR IGNORE INTO blocks(block_number, hash, producer_id, timestamp) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    block.number as i64,
                    format!("{:#x}", block.hash),
                    block.producer_id,
                    block.timestamp as i64,
                ],
            )
            .context("inserting block")?;
        Ok(())
    }

    pub fn insert_transaction(&self, tx: &Tx) -> anyhow::Result<()> {
        self.write()
            .execute(
                "INSERT OR IGNORE INTO transactions(hash, first_seen, sender) \
                 VALUES (?1, ?2, ?3)",
                params![
                    format!("{:#x}", tx.hash()),
                    tx.first_seen() as i64,
                    format!("{:#x}", tx.sender()),
                ],
            )
            .context("inserting transaction")?;
        Ok(())
    }

    pub fn insert_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        self.write()
            .execute(
                "INSERT OR IGNORE INTO findings(block_number, tx_hash, producer_id, seen_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    finding.block_number as i64,
                    format!("{:#x}", finding.tx_hash),
                    finding.producer_id,
                    finding.seen_at as i64,
                ],
            )
            .context("inserting finding")?;
        Ok(())
    }

    pub fn stats(&self, now: u64) -> anyhow::Result<Stats> {
        let cutoff = now.saturating_sub(24 * 60 * 60) as i64;
        let conn = self.read();
        let count = |query: &str| -> anyhow::Result<u64> {
            let n: i64 = conn.query_row(query, params![cutoff], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(Stats {
            num_blocks: count("SELECT count(*) FROM blocks WHERE timestamp > ?1")?,
            num_transactions: count("SELECT count(*) FROM transactions WHERE first_seen > ?1")?,
            num_validators: count(
                "SELECT count(DISTINCT producer_id) FROM blocks WHERE timestamp > ?1",
            )?,
        })
    }

    pub fn recent_blocks(&self, limit: usize) -> anyhow::Result<Vec<BlockRow>> {
        let conn = self.read();
        let mut stmt = conn.prepare(
            "SELECT block_number, hash, producer_id, timestamp FROM blocks \
             ORDER BY block_number DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(BlockRow {
                    block_number: row.get::<_, i64>(0)? as u64,
                    hash: row.get(1)?,
                    producer_id: row.get(2)?,
                    timestamp: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn recent_transactions(&self, limit: usize) -> anyhow::Result<Vec<TransactionRow>> {
        let conn = self.read();
        let mut stmt = conn.prepare(
            "SELECT hash, first_seen, sender FROM transactions \
             ORDER BY first_seen DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TransactionRow {
                    hash: row.get(0)?,
                    first_seen: row.get::<_, i64>(1)? as u64,
                    sender: row.get(2)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// For every producer with at least one finding, the hash of the most
    /// recent block in which they omitted an includable transaction.
    pub fn validators_with_last_censored(&self) -> anyhow::Result<Vec<ValidatorRow>> {
        let conn = self.read();
        let mut stmt = conn.prepare(
            "SELECT f.producer_id, b.hash \
             FROM (SELECT producer_id, MAX(block_number) AS block_number \
                   FROM findings GROUP BY producer_id) f \
             JOIN blocks b ON b.block_number = f.block_number \
             ORDER BY f.block_number DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ValidatorRow {
                    producer_id: row.get(0)?,
                    last_censored_block: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl Sink for Database {
    async fn put_block(&self, block: &Block) -> anyhow::Result<()> {
        self.insert_block(block)
    }

    async fn put_transaction(&self, tx: &Tx) -> anyhow::Result<()> {
        self.insert_transaction(tx)
    }

    async fn put_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        self.insert_finding(finding)
    }
}
