//! Hash-linked blocks and proof-of-work mining
//!
//! A block seals one or more staged records under a nonce whose block
//! hash carries at least `threshold` leading zero bits. Blocks link
//! backwards through `previous`, forming the chain.

use crate::error::Result;
use crate::record::Record;
use amber_core::Blake3Hash;
use serde::{Deserialize, Serialize};

/// No gate; blocks seal on the first nonce. Test chains use this.
pub const THRESHOLD_NONE: u32 = 0;
/// Light gate for throwaway chains
pub const THRESHOLD_LIGHT: u32 = 12;
/// Standard gate for archive chains
pub const THRESHOLD_STANDARD: u32 = 16;
/// Heavy gate for long-lived shared chains
pub const THRESHOLD_HEAVY: u32 = 22;

/// A record plus its content address, as stored in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub record_hash: Blake3Hash,
    pub record: Record,
}

/// One sealed block of records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the preceding block; `None` for the genesis block
    pub previous: Option<Blake3Hash>,
    /// Sealing time, unix milliseconds
    pub timestamp_ms: u64,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Records sealed in this block, oldest first
    pub entries: Vec<BlockEntry>,
}

impl Block {
    /// Content address of this block.
    ///
    /// The nonce is hashed over the body digest rather than the
    /// serialized block, so the cost of one mining attempt is
    /// independent of how large the sealed records are.
    pub fn hash(&self) -> Result<Blake3Hash> {
        Ok(seal_hash(&self.body_hash()?, self.nonce))
    }

    /// Digest of everything except the nonce
    pub fn body_hash(&self) -> Result<Blake3Hash> {
        let mut body = bincode::serialize(&self.previous)?;
        body.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        body.extend_from_slice(&bincode::serialize(&self.entries)?);
        Ok(amber_core::hash::hash_bytes(&body))
    }
}

/// Combine a body digest with a nonce into the sealed block hash
fn seal_hash(body: &Blake3Hash, nonce: u64) -> Blake3Hash {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(body.as_bytes());
    buf[32..].copy_from_slice(&nonce.to_le_bytes());
    amber_core::hash::hash_bytes(&buf)
}

/// Observer for the nonce search; all hooks default to no-ops.
pub trait MiningListener {
    /// Search started for a block on `chain`
    fn started(&self, _chain: &str) {}
    /// A nonce improved the best leading-zero-bit count so far
    fn improved(&self, _attempts: u64, _best_bits: u32, _threshold: u32) {}
    /// Search finished
    fn mined(&self, _chain: &str, _hash: &Blake3Hash) {}
}

/// Listener that reports nothing
pub struct NoopListener;

impl MiningListener for NoopListener {}

/// Search nonces until the block hash satisfies `threshold`, returning
/// the sealed block and its hash.
pub fn mine_block(
    chain: &str,
    mut block: Block,
    threshold: u32,
    listener: &dyn MiningListener,
) -> Result<(Blake3Hash, Block)> {
    listener.started(chain);
    let body = block.body_hash()?;
    let mut best = 0u32;
    let mut attempts = 0u64;
    loop {
        let hash = seal_hash(&body, block.nonce);
        attempts += 1;
        let bits = hash.leading_zero_bits();
        if bits > best {
            best = bits;
            listener.improved(attempts, best, threshold);
        }
        if bits >= threshold {
            listener.mined(chain, &hash);
            return Ok((hash, block));
        }
        block.nonce = block.nonce.wrapping_add(1);
    }
}
