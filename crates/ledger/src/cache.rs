//! Sled-backed local block cache
//!
//! Three trees: staged records awaiting mining (keyed by chain name
//! plus an insertion sequence), sealed blocks by hash, and chain heads
//! by name. Block bodies are zstd-compressed on disk. Every mutation
//! flushes, so a committed record survives a crash.

use crate::block::{Block, BlockEntry};
use crate::error::{Error, Result};
use amber_core::Blake3Hash;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const COMPRESSION_LEVEL: i32 = 3;

/// Local store for staged records, sealed blocks, and chain heads
pub struct BlockCache {
    db: sled::Db,
    staged: sled::Tree,
    blocks: sled::Tree,
    heads: sled::Tree,
    /// Monotonic staging sequence, restored on open
    seq: AtomicU64,
}

impl BlockCache {
    /// Open or create a cache at the given directory
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        let staged = db.open_tree("staged")?;
        let blocks = db.open_tree("blocks")?;
        let heads = db.open_tree("heads")?;

        // Restore the staging sequence counter from surviving keys
        let mut max_seq = 0u64;
        for item in staged.iter() {
            let (key, _) = item?;
            if key.len() >= 8 {
                let tail: [u8; 8] = key[key.len() - 8..].try_into().unwrap();
                max_seq = max_seq.max(u64::from_be_bytes(tail));
            }
        }

        Ok(Self {
            db,
            staged,
            blocks,
            heads,
            seq: AtomicU64::new(max_seq + 1),
        })
    }

    /// Stage a record under a chain name, to be sealed by the next mine
    pub fn stage_record(&self, chain: &str, entry: &BlockEntry) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.staged
            .insert(staged_key(chain, seq), bincode::serialize(entry)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// Remove and return all staged records for a chain, oldest first
    pub fn take_staged(&self, chain: &str) -> Result<Vec<BlockEntry>> {
        let mut entries = Vec::new();
        let mut keys = Vec::new();
        for item in self.staged.scan_prefix(staged_prefix(chain)) {
            let (key, value) = item?;
            entries.push(bincode::deserialize(&value)?);
            keys.push(key);
        }
        for key in keys {
            self.staged.remove(key)?;
        }
        self.db.flush()?;
        Ok(entries)
    }

    /// Number of records currently staged for a chain
    pub fn staged_count(&self, chain: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.staged.scan_prefix(staged_prefix(chain)) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Store a sealed block under its hash
    pub fn put_block(&self, hash: &Blake3Hash, block: &Block) -> Result<()> {
        let body = bincode::serialize(block)?;
        let compressed = zstd::encode_all(&body[..], COMPRESSION_LEVEL)?;
        self.blocks.insert(hash.as_bytes(), compressed)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load a block by hash
    pub fn block(&self, hash: &Blake3Hash) -> Result<Option<Block>> {
        match self.blocks.get(hash.as_bytes())? {
            Some(compressed) => {
                let body = zstd::decode_all(&compressed[..])?;
                Ok(Some(bincode::deserialize(&body)?))
            }
            None => Ok(None),
        }
    }

    /// Record the head block of a chain
    pub fn set_head(&self, chain: &str, hash: &Blake3Hash) -> Result<()> {
        self.heads.insert(chain.as_bytes(), hash.as_bytes().as_slice())?;
        self.db.flush()?;
        Ok(())
    }

    /// Cached head of a chain, if any
    pub fn head(&self, chain: &str) -> Result<Option<Blake3Hash>> {
        match self.heads.get(chain.as_bytes())? {
            Some(raw) => {
                let bytes: [u8; 32] = raw.as_ref().try_into().map_err(|_| Error::MalformedChain {
                    chain: chain.to_string(),
                    reason: "cached head is not 32 bytes".to_string(),
                })?;
                Ok(Some(Blake3Hash::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }
}

fn staged_prefix(chain: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(chain.len() + 1);
    key.extend_from_slice(chain.as_bytes());
    key.push(0);
    key
}

fn staged_key(chain: &str, seq: u64) -> Vec<u8> {
    let mut key = staged_prefix(chain);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn entry(payload: &[u8]) -> BlockEntry {
        let record = Record::sign(1, "tester", &[0u8; 32], payload.to_vec());
        BlockEntry {
            record_hash: record.hash().unwrap(),
            record,
        }
    }

    fn open_temp() -> (tempfile::TempDir, BlockCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = BlockCache::open(&dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_stage_and_take_preserves_order() {
        let (_dir, cache) = open_temp();
        cache.stage_record("chain-a", &entry(b"one")).unwrap();
        cache.stage_record("chain-a", &entry(b"two")).unwrap();
        cache.stage_record("chain-b", &entry(b"other")).unwrap();

        let taken = cache.take_staged("chain-a").unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].record.payload, b"one");
        assert_eq!(taken[1].record.payload, b"two");

        // Draining is destructive and per-chain
        assert_eq!(cache.staged_count("chain-a").unwrap(), 0);
        assert_eq!(cache.staged_count("chain-b").unwrap(), 1);
    }

    #[test]
    fn test_block_roundtrip() {
        let (_dir, cache) = open_temp();
        let block = Block {
            previous: None,
            timestamp_ms: 7,
            nonce: 3,
            entries: vec![entry(b"data")],
        };
        let hash = block.hash().unwrap();

        cache.put_block(&hash, &block).unwrap();
        assert_eq!(cache.block(&hash).unwrap(), Some(block));
        assert_eq!(
            cache.block(&Blake3Hash::from_bytes([9; 32])).unwrap(),
            None
        );
    }

    #[test]
    fn test_head_roundtrip() {
        let (_dir, cache) = open_temp();
        assert_eq!(cache.head("chain-a").unwrap(), None);

        let hash = Blake3Hash::from_bytes([5; 32]);
        cache.set_head("chain-a", &hash).unwrap();
        assert_eq!(cache.head("chain-a").unwrap(), Some(hash));
    }

    #[test]
    fn test_staged_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        {
            let cache = BlockCache::open(&path).unwrap();
            cache.stage_record("chain-a", &entry(b"kept")).unwrap();
        }
        let cache = BlockCache::open(&path).unwrap();
        let taken = cache.take_staged("chain-a").unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].record.payload, b"kept");
    }
}
