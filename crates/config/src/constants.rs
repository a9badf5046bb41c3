/// Seconds to wait after a new head before refreshing the mempool view.
pub const DEFAULT_MEMPOOL_FETCH_INTERVAL_SEC: u16 = 6;

/// Upper bound on a nonce lookup during analysis; expiry means the sender
/// is treated as not ready rather than blocking the engine.
pub const DEFAULT_NONCE_RPC_TIMEOUT_MS: u16 = 10_000;

/// Base-fee headroom a pending transaction must afford before its omission
/// counts as censorship, as (numerator, denominator).
pub const DEFAULT_BASE_FEE_HEADROOM: (u128, u128) = (3, 2);

/// First retry delay when an announced block is not yet served.
pub const BLOCK_FETCH_MIN_BACKOFF_MS: u64 = 50;

/// Retry delay cap for block fetches.
pub const BLOCK_FETCH_MAX_BACKOFF_SEC: u64 = 5;

/// Capacity of the bounded mailbox between source tasks and the engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Rows returned by the recent-blocks/recent-transactions queries.
pub const API_RECENT_LIMIT: usize = 100;

pub const DEFAULT_DB_PATH: &str = "censorscope.db";

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8089";
