//! BLAKE3 hashing primitives for record addressing and proof-of-work

use serde::{Deserialize, Serialize};

/// A BLAKE3 hash (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Blake3Hash([u8; 32]);

impl Blake3Hash {
    /// Create a new Blake3Hash from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| anyhow::anyhow!("expected 32 hash bytes, got {}", v.len()))?;
        Ok(Self(bytes))
    }

    /// Number of leading zero bits, the proof-of-work measure a mined
    /// block must push past its chain's threshold.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0;
        for &byte in &self.0 {
            if byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }
}

impl std::fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blake3Hash({})", self.to_hex())
    }
}

impl std::fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Blake3Hash {
    let hash = blake3::hash(data);
    Blake3Hash::from_bytes(*hash.as_bytes())
}

/// Keyed BLAKE3 MAC, used to authenticate ledger records under a
/// locally held 32-byte secret.
pub fn keyed_mac(key: &[u8; 32], data: &[u8]) -> Blake3Hash {
    let hash = blake3::keyed_hash(key, data);
    Blake3Hash::from_bytes(*hash.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        let data = b"hello world";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = Blake3Hash::from_bytes([42; 32]);
        let hex = original.to_hex();
        let decoded = Blake3Hash::from_hex(&hex).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(hex.len(), 64);
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert!(Blake3Hash::from_hex("abc").is_err());
        assert!(Blake3Hash::from_hex("").is_err());
        assert!(Blake3Hash::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(Blake3Hash::from_bytes([0; 32]).leading_zero_bits(), 256);
        assert_eq!(Blake3Hash::from_bytes([0xff; 32]).leading_zero_bits(), 0);

        let mut bytes = [0u8; 32];
        bytes[0] = 0b0000_0001;
        assert_eq!(Blake3Hash::from_bytes(bytes).leading_zero_bits(), 7);

        let mut bytes = [0u8; 32];
        bytes[2] = 0b0010_0000;
        assert_eq!(Blake3Hash::from_bytes(bytes).leading_zero_bits(), 18);
    }

    #[test]
    fn test_keyed_mac_depends_on_key() {
        let data = b"payload";
        let mac1 = keyed_mac(&[1; 32], data);
        let mac2 = keyed_mac(&[2; 32], data);
        assert_ne!(mac1, mac2);
        assert_eq!(mac1, keyed_mac(&[1; 32], data));
    }

    #[test]
    fn test_different_data_different_hash() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }
}
