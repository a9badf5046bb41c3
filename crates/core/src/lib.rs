//! Censorship-analysis engine.
//!
//! The engine ingests normalized events from a [`ChainSource`] (new heads,
//! pending-transaction announcements, mempool snapshots), reconciles them
//! into a [`ChainState`] of pending versus included transactions, and runs
//! the per-block inclusion-eligibility test that attributes omissions to a
//! specific block producer. Findings and observed chain data are persisted
//! through a [`Sink`].

pub mod analyzer;
pub mod clock;
pub mod engine;
pub mod error;
pub mod fee;
pub mod rpc;
pub mod sink;
pub mod source;
pub mod state;
mod testing;

pub use self::{
    analyzer::CensorshipAnalyzer,
    clock::{Clock, SystemClock},
    engine::Engine,
    error::SourceError,
    rpc::RpcChainSource,
    sink::Sink,
    source::{ChainSource, HeadAnnouncement, SourceEvent},
    state::{ChainState, MempoolSnapshot, PendingTx},
};
