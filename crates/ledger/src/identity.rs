//! Local signing identity
//!
//! A 32-byte secret plus a human-readable alias, generated once by
//! `amber init` and stored as TOML beside the block cache. Records are
//! authenticated with a keyed BLAKE3 MAC under this secret.

use crate::error::{Error, Result};
use amber_core::hash::{hash_bytes, Blake3Hash};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;

const IDENTITY_FILE: &str = "identity.toml";

/// On-disk form; the secret is hex-encoded
#[derive(Serialize, Deserialize)]
struct IdentityFile {
    alias: String,
    secret: String,
}

/// Signing identity for this node
#[derive(Debug)]
pub struct Identity {
    alias: String,
    secret: [u8; 32],
}

impl Identity {
    /// Generate a fresh identity with a random secret
    pub fn generate(alias: impl Into<String>) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            alias: alias.into(),
            secret,
        }
    }

    /// Load the identity stored under `root`
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(IDENTITY_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::Identity(format!("read {}: {} (run `amber init` first)", path.display(), e))
        })?;
        let file: IdentityFile = toml::from_str(&raw)
            .map_err(|e| Error::Identity(format!("parse {}: {}", path.display(), e)))?;
        let secret = hex::decode(&file.secret)
            .ok()
            .and_then(|v| <[u8; 32]>::try_from(v).ok())
            .ok_or_else(|| Error::Identity(format!("{}: secret is not 32 hex bytes", path.display())))?;
        Ok(Self {
            alias: file.alias,
            secret,
        })
    }

    /// Persist under `root`; refuses to clobber an existing identity
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(IDENTITY_FILE);
        if path.exists() {
            return Err(Error::Identity(format!(
                "{} already exists",
                path.display()
            )));
        }
        let file = IdentityFile {
            alias: self.alias.clone(),
            secret: hex::encode(self.secret),
        };
        let raw = toml::to_string_pretty(&file)
            .map_err(|e| Error::Identity(format!("encode identity: {}", e)))?;
        std::fs::write(&path, raw)?;
        Ok(())
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Public fingerprint, safe to display and share
    pub fn fingerprint(&self) -> Blake3Hash {
        hash_bytes(&self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::generate("alice");
        identity.save(dir.path()).unwrap();

        let loaded = Identity::load(dir.path()).unwrap();
        assert_eq!(loaded.alias(), "alice");
        assert_eq!(loaded.key(), identity.key());
        assert_eq!(loaded.fingerprint(), identity.fingerprint());
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        Identity::generate("alice").save(dir.path()).unwrap();
        assert!(Identity::generate("bob").save(dir.path()).is_err());
    }

    #[test]
    fn test_load_missing_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Identity::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("amber init"));
    }
}
