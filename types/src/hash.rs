use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// A 32-byte opaque hash.
///
/// Bytes are kept in canonical orientation in memory and in the store.
/// The external boundary (JSON, URLs) is little-endian hex, so encoding
/// reverses the byte order and decoding reverses it back.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; Self::LENGTH]);

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("invalid hash length: expected {expected} hex chars, got {got}")]
    Length { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Hash {
    pub const LENGTH: usize = 32;

    /// The all-zeroes sentinel, used for missing pre-images and the
    /// genesis previous-block link.
    pub const ZERO: Self = Self([0; Self::LENGTH]);

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn into_inner(self) -> [u8; Self::LENGTH] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; Self::LENGTH]
    }

    /// Parses little-endian hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != Self::LENGTH * 2 {
            return Err(HashParseError::Length {
                expected: Self::LENGTH * 2,
                got: s.len(),
            });
        }
        let mut bytes = [0u8; Self::LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Little-endian hex with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        format!("0x{}", hex::encode(bytes))
    }
}

/// Keccak-256 of `data`.
pub fn hash(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Keccak-256 over the concatenation of `parts`.
pub fn hash_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_is_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let h = Hash::new(bytes);

        // The first canonical byte must appear last in the hex form.
        let hex = h.to_hex();
        assert!(hex.starts_with("0x"));
        assert!(hex.ends_with("ab"));

        assert_eq!(Hash::from_hex(&hex).unwrap(), h);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Hash::from_hex("0x1234").is_err());
        assert!(Hash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_hash_multi_matches_concatenation() {
        let a = b"alpha";
        let b = b"beta";
        let mut joined = Vec::new();
        joined.extend_from_slice(a);
        joined.extend_from_slice(b);

        assert_eq!(hash_multi(&[a, b]), hash(&joined));
        assert_ne!(hash_multi(&[a, b]), hash_multi(&[b, a]));
    }

    #[test]
    fn test_serde_round_trip() {
        let h = hash(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
