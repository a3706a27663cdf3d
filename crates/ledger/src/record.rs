//! Signed ledger records
//!
//! A record carries one opaque payload plus the author alias, a
//! timestamp, and a keyed-BLAKE3 authentication tag. The record hash
//! (BLAKE3 over the bincode encoding) is the record's address; derived
//! chain names are built from it.

use crate::error::Result;
use amber_core::hash::{hash_bytes, keyed_mac, Blake3Hash};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One signed entry in a chain block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Creation time, unix milliseconds
    pub timestamp_ms: u64,
    /// Author alias
    pub author: String,
    /// Keyed MAC over timestamp, author, and payload
    pub signature: Blake3Hash,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record signed under the given 32-byte secret
    pub fn sign(timestamp_ms: u64, author: &str, key: &[u8; 32], payload: Vec<u8>) -> Self {
        let signature = mac(key, timestamp_ms, author, &payload);
        Self {
            timestamp_ms,
            author: author.to_string(),
            signature,
            payload,
        }
    }

    /// Check the authentication tag under the given secret
    pub fn verify(&self, key: &[u8; 32]) -> bool {
        self.signature == mac(key, self.timestamp_ms, &self.author, &self.payload)
    }

    /// Content address of this record
    pub fn hash(&self) -> Result<Blake3Hash> {
        Ok(hash_bytes(&bincode::serialize(self)?))
    }
}

fn mac(key: &[u8; 32], timestamp_ms: u64, author: &str, payload: &[u8]) -> Blake3Hash {
    let mut buf = Vec::with_capacity(8 + author.len() + payload.len());
    buf.extend_from_slice(&timestamp_ms.to_le_bytes());
    buf.extend_from_slice(author.as_bytes());
    buf.extend_from_slice(payload);
    keyed_mac(key, &buf)
}

/// Current time in unix milliseconds
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = [7u8; 32];
        let record = Record::sign(1234, "alice", &key, b"payload".to_vec());
        assert!(record.verify(&key));
        assert!(!record.verify(&[8u8; 32]));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let key = [7u8; 32];
        let mut record = Record::sign(1234, "alice", &key, b"payload".to_vec());
        record.payload[0] ^= 1;
        assert!(!record.verify(&key));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let key = [7u8; 32];
        let record = Record::sign(1234, "alice", &key, b"payload".to_vec());
        assert_eq!(record.hash().unwrap(), record.hash().unwrap());

        let other = Record::sign(1235, "alice", &key, b"payload".to_vec());
        assert_ne!(record.hash().unwrap(), other.hash().unwrap());
    }
}
