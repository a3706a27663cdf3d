//! Experiments: create, open, save, clean
//!
//! `create` walks directory trees and streams every regular file into
//! the ledger; `save` replays the recorded chains into a destination
//! directory. Both are synchronous sequences of blocking filesystem
//! and chain calls, processing one file at a time.

use crate::path_entry::PathEntry;
use crate::replay::replay;
use amber_core::delta::{apply_to_file, file_to_deltas, MAX_DELTA_LEN};
use amber_core::{Blake3Hash, Delta};
use anyhow::{Context, Result};
use ledger::{Chain, MiningListener, Node, THRESHOLD_STANDARD};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Length of a generated experiment id
pub const EXPERIMENT_ID_LEN: usize = 16;

/// Proof-of-work gate for all archive chains
pub const CHAIN_THRESHOLD: u32 = THRESHOLD_STANDARD;

/// Namespace shared by every archive chain
const CHAIN_PREFIX: &str = "Amber-";

/// The kinds of chain an experiment can own.
///
/// New kinds (the original design sketches chat and drawing chains)
/// get a prefix here and leave replay and patch logic untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    /// Path-index chain, one per experiment, keyed by experiment id
    Path,
    /// Content chain, one per archived file, keyed by the hex hash of
    /// the path record that announced the file
    File,
}

impl ChainKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ChainKind::Path => "Amber-Path-",
            ChainKind::File => "Amber-File-",
        }
    }

    /// Full chain name for the given key
    pub fn chain_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }
}

/// Root handle for one archived collection of files
#[derive(Debug, Clone)]
pub struct Experiment {
    /// Fixed-length random identifier
    pub id: String,
    /// The experiment's path-index chain
    pub path_chain: Chain,
}

/// Serve-loop policy: accept any chain in the archive namespace,
/// validating under the standard threshold.
pub fn accepts_chain(name: &str) -> Option<u32> {
    name.starts_with(CHAIN_PREFIX).then_some(CHAIN_THRESHOLD)
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(EXPERIMENT_ID_LEN)
        .map(char::from)
        .collect()
}

fn open_path_chain(id: &str) -> Chain {
    Chain::open(ChainKind::Path.chain_name(id), CHAIN_THRESHOLD)
}

fn open_file_chain(path_record_hash: &Blake3Hash) -> Chain {
    Chain::open(
        ChainKind::File.chain_name(&path_record_hash.to_hex()),
        CHAIN_THRESHOLD,
    )
}

/// Archive every regular file under the given roots into a new
/// experiment.
///
/// Directories and symbolic links are skipped silently. The first
/// error aborts the walk; records already sealed stay on their chains.
pub fn create(node: &Node, listener: &dyn MiningListener, paths: &[PathBuf]) -> Result<Experiment> {
    let id = random_id();
    let path_chain = open_path_chain(&id);
    let path_chain_name = path_chain.name.clone();
    node.add_chain(path_chain);
    info!(experiment = %id, "creating experiment");

    for root in paths {
        for dirent in WalkDir::new(root).follow_links(false) {
            let dirent = dirent.with_context(|| format!("walking {}", root.display()))?;
            let file_type = dirent.file_type();
            if !file_type.is_file() {
                debug!(path = %dirent.path().display(), "skipping non-regular file");
                continue;
            }
            archive_file(node, listener, &path_chain_name, root, dirent.path())?;
        }
    }

    let path_chain = node
        .chain(&path_chain_name)
        .expect("path chain registered above");
    Ok(Experiment { id, path_chain })
}

/// Record one file: a path record on the experiment's path chain, then
/// one delta record per chunk on the file's own content chain.
fn archive_file(
    node: &Node,
    listener: &dyn MiningListener,
    path_chain_name: &str,
    root: &Path,
    file: &Path,
) -> Result<()> {
    let entry = PathEntry::for_file(root, file)?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    info!(file = %entry, size, "archiving");

    let record_hash = node
        .write_record(path_chain_name, bincode::serialize(&entry)?, listener)
        .with_context(|| format!("recording path of {}", file.display()))?;

    let file_chain = open_file_chain(&record_hash);
    let file_chain_name = file_chain.name.clone();
    node.add_chain(file_chain);

    file_to_deltas(file, MAX_DELTA_LEN, |delta| {
        node.write_record(&file_chain_name, bincode::serialize(&delta)?, listener)
            .with_context(|| format!("recording content of {}", file.display()))?;
        Ok(())
    })
}

/// Reopen an experiment by id.
///
/// The cached head is loaded and peers are pulled best-effort:
/// failures are logged and the experiment proceeds with whatever local
/// state exists.
pub fn open(node: &Node, id: &str) -> Result<Experiment> {
    let mut path_chain = open_path_chain(id);

    if let Err(e) = path_chain.load_cached_head(node.cache()) {
        warn!(chain = %path_chain.name, error = %e, "no cached head");
    }
    if let Some(network) = node.network() {
        if let Err(e) = path_chain.pull(node.cache(), network) {
            warn!(chain = %path_chain.name, error = %e, "pull failed");
        }
    }
    node.add_chain(path_chain.clone());

    Ok(Experiment {
        id: id.to_string(),
        path_chain,
    })
}

/// Reconstruct every archived file under `dest_root`, returning the
/// number of files restored.
///
/// Each path record's content chain is resolved by its derived name:
/// from the node registry if the chain is already open, otherwise
/// lazily from the cache (and peers, best-effort). Output files are
/// created on first write; parent directories are created as needed.
pub fn save(node: &Node, experiment: &Experiment, dest_root: &Path) -> Result<usize> {
    let mut restored = 0usize;
    replay::<PathEntry, _>(node, &experiment.path_chain, |record_hash, _, entry| {
        let target = entry.join(dest_root);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let file_chain = resolve_file_chain(node, record_hash);
        replay::<Delta, _>(node, &file_chain, |_, _, delta| {
            apply_to_file(&delta, &target)
                .with_context(|| format!("patching {}", target.display()))?;
            Ok(())
        })?;

        info!(file = %entry, "restored");
        restored += 1;
        Ok(())
    })?;
    Ok(restored)
}

fn resolve_file_chain(node: &Node, path_record_hash: &Blake3Hash) -> Chain {
    let name = ChainKind::File.chain_name(&path_record_hash.to_hex());
    if let Some(chain) = node.chain(&name) {
        return chain;
    }

    let mut chain = Chain::open(name, CHAIN_THRESHOLD);
    if let Err(e) = chain.load_cached_head(node.cache()) {
        warn!(chain = %chain.name, error = %e, "no cached head");
    }
    if let Some(network) = node.network() {
        if let Err(e) = chain.pull(node.cache(), network) {
            warn!(chain = %chain.name, error = %e, "pull failed");
        }
    }
    node.add_chain(chain.clone());
    chain
}

/// Reserved for future cache garbage collection; currently a no-op
/// and must not be relied on to free storage.
pub fn clean(_node: &Node, _id: &str) -> Result<()> {
    Ok(())
}
