//! The node context object
//!
//! Owns the pieces every ledger operation needs: the root directory,
//! the signing identity, the block cache, the optional peer set, and
//! the registry of open chains keyed by name. Passing a `Node`
//! explicitly replaces any ambient global state; callers control its
//! lifetime.

use crate::block::{mine_block, Block, BlockEntry, MiningListener};
use crate::cache::BlockCache;
use crate::chain::{chain_length, Chain};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::network::TcpPeers;
use crate::record::{timestamp_ms, Record};
use amber_core::Blake3Hash;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Context object for all chain operations
pub struct Node {
    root: PathBuf,
    identity: Identity,
    cache: BlockCache,
    network: Option<TcpPeers>,
    /// Open chains by name; content chains are resolved through this
    /// registry by their derived names
    chains: DashMap<String, Chain>,
}

impl Node {
    /// Open a node rooted at `root`. The identity must exist already
    /// (see [`Node::init`]); the cache is created on demand.
    pub fn open(root: &Path, network: Option<TcpPeers>) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let identity = Identity::load(root)?;
        let cache = BlockCache::open(&root.join("cache"))?;
        Ok(Self {
            root: root.to_path_buf(),
            identity,
            cache,
            network,
            chains: DashMap::new(),
        })
    }

    /// Generate and persist a fresh identity under `root`
    pub fn init(root: &Path, alias: &str) -> Result<Identity> {
        std::fs::create_dir_all(root)?;
        let identity = Identity::generate(alias);
        identity.save(root)?;
        Ok(identity)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn network(&self) -> Option<&TcpPeers> {
        self.network.as_ref()
    }

    /// Register a chain, keeping an existing registration if present
    pub fn add_chain(&self, chain: Chain) {
        self.chains.entry(chain.name.clone()).or_insert(chain);
    }

    /// Look up a registered chain by name
    pub fn chain(&self, name: &str) -> Option<Chain> {
        self.chains.get(name).map(|c| c.clone())
    }

    /// Sign a payload, stage it, and seal it into the named chain,
    /// pushing the new head to peers. A push failure is fatal, like
    /// any other write failure; the mined block stays committed
    /// locally either way.
    pub fn write_record(
        &self,
        chain_name: &str,
        payload: Vec<u8>,
        listener: &dyn MiningListener,
    ) -> Result<Blake3Hash> {
        let record = Record::sign(
            timestamp_ms(),
            self.identity.alias(),
            self.identity.key(),
            payload,
        );
        let record_hash = record.hash()?;
        self.cache.stage_record(
            chain_name,
            &BlockEntry {
                record_hash,
                record,
            },
        )?;
        self.mine(chain_name, listener)?;

        if let Some(network) = &self.network {
            let chain = self
                .chain(chain_name)
                .ok_or_else(|| Error::UnknownChain(chain_name.to_string()))?;
            chain.push(&self.cache, network)?;
        }
        Ok(record_hash)
    }

    /// Seal all staged records for a chain into one mined block and
    /// advance the head.
    pub fn mine(
        &self,
        chain_name: &str,
        listener: &dyn MiningListener,
    ) -> Result<(Blake3Hash, Block)> {
        let entries = self.cache.take_staged(chain_name)?;
        if entries.is_empty() {
            return Err(Error::NothingToMine(chain_name.to_string()));
        }

        let mut chain = self
            .chains
            .get_mut(chain_name)
            .ok_or_else(|| Error::UnknownChain(chain_name.to_string()))?;
        let candidate = Block {
            previous: chain.head,
            timestamp_ms: timestamp_ms(),
            nonce: 0,
            entries,
        };
        let (hash, block) = mine_block(chain_name, candidate, chain.threshold, listener)?;
        self.cache.put_block(&hash, &block)?;
        self.cache.set_head(chain_name, &hash)?;
        chain.head = Some(hash);
        debug!(chain = chain_name, block = %hash, "sealed block");
        Ok((hash, block))
    }

    /// Move a chain's head to `hash` if the chain it closes over is
    /// strictly longer than the current one. Used when peers announce.
    pub fn adopt_head(&self, chain_name: &str, hash: &Blake3Hash) -> Result<()> {
        let new_len = chain_length(&self.cache, Some(*hash))?;
        let current = self.cache.head(chain_name)?;
        let current_len = chain_length(&self.cache, current)?;
        if new_len > current_len {
            self.cache.set_head(chain_name, hash)?;
            if let Some(mut chain) = self.chains.get_mut(chain_name) {
                chain.head = Some(*hash);
            }
            debug!(chain = chain_name, head = %hash, "adopted announced head");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{NoopListener, THRESHOLD_NONE};

    fn open_node(dir: &Path) -> Node {
        Node::init(dir, "tester").unwrap();
        Node::open(dir, None).unwrap()
    }

    #[test]
    fn test_open_requires_identity() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Node::open(dir.path(), None),
            Err(Error::Identity(_))
        ));
    }

    #[test]
    fn test_write_record_advances_head() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        node.add_chain(Chain::open("test", THRESHOLD_NONE));

        let first = node
            .write_record("test", b"one".to_vec(), &NoopListener)
            .unwrap();
        let second = node
            .write_record("test", b"two".to_vec(), &NoopListener)
            .unwrap();
        assert_ne!(first, second);

        let chain = node.chain("test").unwrap();
        assert_eq!(chain.length(node.cache()).unwrap(), 2);

        // Each record verifies under this node's key
        chain
            .iterate_chronologically(node.cache(), |_, block| {
                for entry in &block.entries {
                    assert!(entry.record.verify(node.identity().key()));
                    assert_eq!(entry.record_hash, entry.record.hash()?);
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_write_to_unregistered_chain_fails() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        assert!(matches!(
            node.write_record("ghost", b"x".to_vec(), &NoopListener),
            Err(Error::UnknownChain(_))
        ));
    }

    #[test]
    fn test_mine_requires_staged_records() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        node.add_chain(Chain::open("test", THRESHOLD_NONE));
        assert!(matches!(
            node.mine("test", &NoopListener),
            Err(Error::NothingToMine(_))
        ));
    }

    #[test]
    fn test_adopt_head_prefers_longer_chain() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        node.add_chain(Chain::open("test", THRESHOLD_NONE));

        node.write_record("test", b"one".to_vec(), &NoopListener)
            .unwrap();
        let short_head = node.chain("test").unwrap().head.unwrap();
        node.write_record("test", b"two".to_vec(), &NoopListener)
            .unwrap();
        let long_head = node.chain("test").unwrap().head.unwrap();

        // Announcing the older, shorter head must not move anything
        node.adopt_head("test", &short_head).unwrap();
        assert_eq!(node.cache().head("test").unwrap(), Some(long_head));
        assert_eq!(node.chain("test").unwrap().head, Some(long_head));
    }
}
