//! Read-only query API for the monitor.
//!
//! Serves the `monitor` JSON-RPC namespace over HTTP, with GET aliases
//! (`/v1/stats`, `/v1/blocks`, `/v1/transactions`, `/v1/validators`)
//! proxied onto the RPC methods so plain REST consumers keep working.
//! Everything is answered from the database's read connection; the engine
//! and its state are never touched.

mod monitor;
mod server;

pub use self::{monitor::MonitorNamespace, server::serve};
