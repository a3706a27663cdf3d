//! Experiment archiving on top of the ledger substrate
//!
//! An experiment is one path-index chain naming every archived file,
//! plus one content chain per file holding its ordered delta history.
//! Content chains are never referenced by pointer; their names are
//! re-derived from the hash of the path record that announced them.
//!
//! This crate owns the chain naming scheme, the typed chain replay,
//! and the create/open/save/clean orchestration.

pub mod experiment;
pub mod path_entry;
pub mod replay;

// Re-exports
pub use experiment::{
    accepts_chain, clean, create, open, save, ChainKind, Experiment, CHAIN_THRESHOLD,
    EXPERIMENT_ID_LEN,
};
pub use path_entry::PathEntry;
pub use replay::replay;
