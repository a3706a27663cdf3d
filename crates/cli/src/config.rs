//! Config file and node bootstrap
//!
//! The root directory holds everything amber persists: config.toml,
//! identity.toml, and the block cache. `$AMBER_ROOT` overrides the
//! default `~/.amber`.

use anyhow::{Context, Result};
use ledger::{Node, TcpPeers};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// User configuration, merged with command-line flags
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default alias for `amber init`
    pub alias: Option<String>,
    /// Replication peers dialed on every command
    pub peers: Vec<String>,
}

impl Config {
    /// Load from `<root>/config.toml`; a missing file is an empty config
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Resolve the amber root directory
pub fn root_dir() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("AMBER_ROOT") {
        return Ok(PathBuf::from(root));
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".amber"))
}

/// Build the peer set from config plus `--peer` flags
pub fn peers_from(config: &Config, flags: &[String]) -> Option<TcpPeers> {
    let peers = TcpPeers::new();
    for peer in config.peers.iter().chain(flags) {
        peers.connect(peer);
    }
    if peers.is_empty() {
        None
    } else {
        Some(peers)
    }
}

/// Open the node every subcommand operates through
pub fn open_node(peer_flags: &[String]) -> Result<Node> {
    let root = root_dir()?;
    let config = Config::load(&root)?;
    let network = peers_from(&config, peer_flags);
    tracing::debug!(root = %root.display(), peers = network.is_some(), "opening node");
    Ok(Node::open(&root, network)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.alias.is_none());
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "alias = \"alice\"\npeers = [\"peer.example.com\"]\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.alias.as_deref(), Some("alice"));
        assert_eq!(config.peers, vec!["peer.example.com".to_string()]);
    }

    #[test]
    fn test_flag_peers_merge_with_config() {
        let config = Config {
            alias: None,
            peers: vec!["a.example.com".to_string()],
        };
        let peers = peers_from(&config, &["b.example.com".to_string()]).unwrap();
        assert!(!peers.is_empty());

        let empty = peers_from(&Config::default(), &[]);
        assert!(empty.is_none());
    }
}
