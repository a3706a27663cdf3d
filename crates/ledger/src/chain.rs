//! Chain handles: open, cached-head load, sync, chronological walk
//!
//! A `Chain` is a lightweight reference to a named, hash-linked block
//! sequence. The blocks themselves live in the cache; peers are only
//! consulted through the explicit pull/push calls, which are
//! best-effort from the caller's point of view.

use crate::block::Block;
use crate::cache::BlockCache;
use crate::error::{Error, Result};
use crate::network::Network;
use amber_core::Blake3Hash;
use tracing::debug;

/// Named append-only chain with a resolvable head
#[derive(Debug, Clone)]
pub struct Chain {
    pub name: String,
    /// Minimum leading zero bits a sealed block's hash must carry
    pub threshold: u32,
    /// Hash of the newest block, if any block exists locally
    pub head: Option<Blake3Hash>,
}

impl Chain {
    /// Open a chain handle by name; no I/O happens here
    pub fn open(name: impl Into<String>, threshold: u32) -> Self {
        Self {
            name: name.into(),
            threshold,
            head: None,
        }
    }

    /// Load the head recorded in the local cache.
    ///
    /// Errors if the cache has never seen this chain; callers opening
    /// best-effort log and continue.
    pub fn load_cached_head(&mut self, cache: &BlockCache) -> Result<()> {
        match cache.head(&self.name)? {
            Some(hash) => {
                self.head = Some(hash);
                Ok(())
            }
            None => Err(Error::NoCachedHead(self.name.clone())),
        }
    }

    /// Number of blocks reachable from the current head
    pub fn length(&self, cache: &BlockCache) -> Result<u64> {
        chain_length(cache, self.head)
    }

    /// Check a block's address and proof-of-work against this chain
    pub fn verify_block(&self, hash: &Blake3Hash, block: &Block) -> Result<()> {
        let actual = block.hash()?;
        if actual != *hash {
            return Err(Error::MalformedChain {
                chain: self.name.clone(),
                reason: format!("block addressed {} hashes to {}", hash, actual),
            });
        }
        if actual.leading_zero_bits() < self.threshold {
            return Err(Error::MalformedChain {
                chain: self.name.clone(),
                reason: format!(
                    "block {} below threshold ({} < {} bits)",
                    hash,
                    actual.leading_zero_bits(),
                    self.threshold
                ),
            });
        }
        Ok(())
    }

    /// Fetch the remote head and any unknown ancestry, then adopt the
    /// remote chain if it is strictly longer and fully valid.
    pub fn pull(&mut self, cache: &BlockCache, network: &dyn Network) -> Result<()> {
        let Some(remote_head) = network.fetch_head(&self.name)? else {
            return Ok(());
        };
        if self.head == Some(remote_head) {
            return Ok(());
        }

        // Walk the remote chain backwards until it meets known blocks.
        let mut cursor = Some(remote_head);
        while let Some(hash) = cursor {
            if cache.block(&hash)?.is_some() {
                break;
            }
            let block = network.fetch_block(&self.name, &hash)?;
            self.verify_block(&hash, &block)?;
            cursor = block.previous;
            cache.put_block(&hash, &block)?;
        }

        let remote_len = chain_length(cache, Some(remote_head))?;
        let local_len = chain_length(cache, self.head)?;
        if remote_len > local_len {
            cache.set_head(&self.name, &remote_head)?;
            self.head = Some(remote_head);
            debug!(chain = %self.name, length = remote_len, "adopted remote head");
        }
        Ok(())
    }

    /// Announce the head block to all peers, supplying predecessor
    /// blocks any peer asks for.
    pub fn push(&self, cache: &BlockCache, network: &dyn Network) -> Result<()> {
        let Some(head) = self.head else {
            return Ok(());
        };
        network.announce(&self.name, &head, &|hash| cache.block(hash))
    }

    /// Walk the chain oldest-first, visiting every block.
    ///
    /// Ordering matters: delta replay depends on it. A missing block
    /// or a callback error aborts the whole walk.
    pub fn iterate_chronologically(
        &self,
        cache: &BlockCache,
        mut visit: impl FnMut(&Blake3Hash, &Block) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut blocks = Vec::new();
        let mut cursor = self.head;
        while let Some(hash) = cursor {
            let block = cache
                .block(&hash)?
                .ok_or(Error::MissingBlock { hash })?;
            cursor = block.previous;
            blocks.push((hash, block));
        }
        for (hash, block) in blocks.into_iter().rev() {
            visit(&hash, &block)?;
        }
        Ok(())
    }
}

/// Count blocks reachable from `head`; zero for an empty chain
pub fn chain_length(cache: &BlockCache, head: Option<Blake3Hash>) -> Result<u64> {
    let mut length = 0u64;
    let mut cursor = head;
    while let Some(hash) = cursor {
        let block = cache
            .block(&hash)?
            .ok_or(Error::MissingBlock { hash })?;
        cursor = block.previous;
        length += 1;
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{mine_block, BlockEntry, NoopListener, THRESHOLD_NONE};
    use crate::record::Record;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn entry(payload: &[u8]) -> BlockEntry {
        let record = Record::sign(1, "tester", &[0u8; 32], payload.to_vec());
        BlockEntry {
            record_hash: record.hash().unwrap(),
            record,
        }
    }

    fn append_block(
        cache: &BlockCache,
        chain: &mut Chain,
        payload: &[u8],
    ) -> Blake3Hash {
        let block = Block {
            previous: chain.head,
            timestamp_ms: 1,
            nonce: 0,
            entries: vec![entry(payload)],
        };
        let (hash, block) = mine_block(&chain.name, block, chain.threshold, &NoopListener).unwrap();
        cache.put_block(&hash, &block).unwrap();
        cache.set_head(&chain.name, &hash).unwrap();
        chain.head = Some(hash);
        hash
    }

    fn open_temp() -> (tempfile::TempDir, BlockCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = BlockCache::open(&dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_iteration_is_oldest_first() {
        let (_dir, cache) = open_temp();
        let mut chain = Chain::open("test", THRESHOLD_NONE);
        append_block(&cache, &mut chain, b"first");
        append_block(&cache, &mut chain, b"second");
        append_block(&cache, &mut chain, b"third");

        let mut seen = Vec::new();
        chain
            .iterate_chronologically(&cache, |_, block| {
                seen.push(block.entries[0].record.payload.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn test_length_and_cached_head() {
        let (_dir, cache) = open_temp();
        let mut chain = Chain::open("test", THRESHOLD_NONE);
        assert_eq!(chain.length(&cache).unwrap(), 0);

        append_block(&cache, &mut chain, b"one");
        append_block(&cache, &mut chain, b"two");
        assert_eq!(chain.length(&cache).unwrap(), 2);

        let mut reopened = Chain::open("test", THRESHOLD_NONE);
        reopened.load_cached_head(&cache).unwrap();
        assert_eq!(reopened.head, chain.head);

        let mut unknown = Chain::open("never-seen", THRESHOLD_NONE);
        assert!(matches!(
            unknown.load_cached_head(&cache),
            Err(Error::NoCachedHead(_))
        ));
    }

    #[test]
    fn test_callback_error_aborts_walk() {
        let (_dir, cache) = open_temp();
        let mut chain = Chain::open("test", THRESHOLD_NONE);
        append_block(&cache, &mut chain, b"first");
        append_block(&cache, &mut chain, b"second");

        let mut visits = 0;
        let result = chain.iterate_chronologically(&cache, |_, _| {
            visits += 1;
            anyhow::bail!("stop")
        });
        assert!(result.is_err());
        assert_eq!(visits, 1);
    }

    /// In-memory network serving one fixed remote chain
    struct StubNetwork {
        head: Blake3Hash,
        blocks: HashMap<Blake3Hash, Block>,
        announced: Mutex<Vec<Blake3Hash>>,
    }

    impl Network for StubNetwork {
        fn fetch_head(&self, _chain: &str) -> Result<Option<Blake3Hash>> {
            Ok(Some(self.head))
        }
        fn fetch_block(&self, _chain: &str, hash: &Blake3Hash) -> Result<Block> {
            self.blocks
                .get(hash)
                .cloned()
                .ok_or(Error::MissingBlock { hash: *hash })
        }
        fn announce(
            &self,
            _chain: &str,
            head: &Blake3Hash,
            _supply: &dyn Fn(&Blake3Hash) -> Result<Option<Block>>,
        ) -> Result<()> {
            self.announced.lock().unwrap().push(*head);
            Ok(())
        }
    }

    fn remote_chain(payloads: &[&[u8]]) -> StubNetwork {
        let (_dir, scratch) = open_temp();
        let mut chain = Chain::open("test", THRESHOLD_NONE);
        let mut blocks = HashMap::new();
        let mut head = None;
        for payload in payloads {
            let hash = append_block(&scratch, &mut chain, payload);
            blocks.insert(hash, scratch.block(&hash).unwrap().unwrap());
            head = Some(hash);
        }
        StubNetwork {
            head: head.unwrap(),
            blocks,
            announced: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_pull_adopts_longer_remote() {
        let (_dir, cache) = open_temp();
        let network = remote_chain(&[b"a", b"b", b"c"]);

        let mut chain = Chain::open("test", THRESHOLD_NONE);
        chain.pull(&cache, &network).unwrap();

        assert_eq!(chain.head, Some(network.head));
        assert_eq!(chain.length(&cache).unwrap(), 3);
        assert_eq!(cache.head("test").unwrap(), Some(network.head));
    }

    #[test]
    fn test_pull_keeps_longer_local() {
        let (_dir, cache) = open_temp();
        let network = remote_chain(&[b"a"]);

        let mut chain = Chain::open("test", THRESHOLD_NONE);
        append_block(&cache, &mut chain, b"x");
        append_block(&cache, &mut chain, b"y");
        let local_head = chain.head;

        chain.pull(&cache, &network).unwrap();
        assert_eq!(chain.head, local_head);
    }

    #[test]
    fn test_push_announces_head() {
        let (_dir, cache) = open_temp();
        let network = remote_chain(&[b"a"]);

        let mut chain = Chain::open("test", THRESHOLD_NONE);
        let head = append_block(&cache, &mut chain, b"mine");
        chain.push(&cache, &network).unwrap();
        assert_eq!(*network.announced.lock().unwrap(), vec![head]);
    }
}
