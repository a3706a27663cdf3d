//! Hashing primitives and the delta codec
//!
//! This crate provides:
//! - BLAKE3 content hashing (`Blake3Hash`, keyed record MACs, the
//!   proof-of-work bit count)
//! - The `Delta` edit operation, the sequential chunking codec, and the
//!   patch engine that replays deltas against buffers and files
//!
//! It has no knowledge of chains or records; the ledger and archive
//! crates build on top of it.

pub mod delta;
pub mod hash;

// Re-exports
pub use delta::{Delta, DeltaError, MAX_DELTA_LEN};
pub use hash::Blake3Hash;
