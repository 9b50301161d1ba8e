use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::signing::PublicKey;

/// A 20-byte account address, derived from the secp256k1 public key as the
/// trailing 20 bytes of its Keccak-256 hash.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; Self::LENGTH]);

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("invalid address length: expected {expected} hex chars, got {got}")]
    Length { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Address {
    pub const LENGTH: usize = 20;

    pub const fn new(value: [u8; Self::LENGTH]) -> Self {
        Self(value)
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = crate::hash::hash(&public_key.to_sec1_bytes());

        // Take the trailing 20 bytes of the key hash.
        let mut address = [0; Self::LENGTH];
        address.copy_from_slice(&digest.as_bytes()[12..]);
        Self(address)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn into_inner(self) -> [u8; Self::LENGTH] {
        self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != Self::LENGTH * 2 {
            return Err(AddressParseError::Length {
                expected: Self::LENGTH * 2,
                got: s.len(),
            });
        }
        let mut bytes = [0u8; Self::LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::signing::PrivateKey;

    #[test]
    fn test_address_is_stable_for_a_key() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(7));
        let a = Address::from_public_key(&key.public_key());
        let b = Address::from_public_key(&key.public_key());
        assert_eq!(a, b);
    }

    #[test]
    fn test_hex_round_trip() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(9));
        let addr = Address::from_public_key(&key.public_key());
        let parsed = Address::from_hex(&addr.to_string()).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Address::from_hex("0x00").is_err());
        assert!(Address::from_hex(&"xy".repeat(20)).is_err());
    }
}
