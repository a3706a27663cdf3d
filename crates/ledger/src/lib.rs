//! Append-only replicated ledger substrate
//!
//! This crate provides:
//! - Signed records and hash-linked blocks sealed by proof-of-work
//! - A sled-backed block cache with staged-record commit semantics
//! - Chain handles: open, cached-head load, pull/push, chronological
//!   iteration
//! - A blocking TCP peer network and serve loop
//! - Local signing identity and the `Node` context object that owns
//!   all of the above
//!
//! Every call is blocking request/response; callers own any
//! cancellation or timeout policy.

pub mod block;
pub mod cache;
pub mod chain;
pub mod error;
pub mod identity;
pub mod network;
pub mod node;
pub mod record;

// Re-exports
pub use amber_core::Blake3Hash;
pub use block::{
    mine_block, Block, BlockEntry, MiningListener, NoopListener, THRESHOLD_HEAVY, THRESHOLD_LIGHT,
    THRESHOLD_NONE, THRESHOLD_STANDARD,
};
pub use cache::BlockCache;
pub use chain::Chain;
pub use error::{Error, Result};
pub use identity::Identity;
pub use network::{serve, Network, TcpPeers};
pub use node::Node;
pub use record::{timestamp_ms, Record};
