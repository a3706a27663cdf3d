//! Ledger error taxonomy
//!
//! Chain and store failures are fatal to the operation that hit them;
//! nothing here retries, and already-committed records are never
//! rolled back.

use amber_core::Blake3Hash;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("block store: {0}")]
    Store(#[from] sled::Error),

    #[error("record codec: {0}")]
    Codec(#[from] bincode::Error),

    #[error("malformed chain {chain}: {reason}")]
    MalformedChain { chain: String, reason: String },

    #[error("block {hash} not in cache or on any peer")]
    MissingBlock { hash: Blake3Hash },

    #[error("chain {0} has no cached head")]
    NoCachedHead(String),

    #[error("chain {0} is not registered with this node")]
    UnknownChain(String),

    #[error("no staged records to mine for chain {0}")]
    NothingToMine(String),

    #[error("identity: {0}")]
    Identity(String),

    #[error("network: {0}")]
    Network(String),
}
