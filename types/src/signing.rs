//! ECDSA signing over secp256k1.
//!
//! Only voter cards and ballots are actually verified by the indexer;
//! block and enrollment signatures are carried opaquely (see
//! [`RawSignature`]) and checked structurally only.

use core::fmt;

use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hash::Hash;

pub const PUBLIC_KEY_LENGTH: usize = 33;
pub const SIGNATURE_LENGTH: usize = 64;

#[derive(Debug, Error)]
#[error("invalid key or signature encoding")]
pub struct KeyError;

#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(SigningKey::random(rng))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        SigningKey::from_slice(bytes).map(Self).map_err(|_| KeyError)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Signs a 32-byte digest.
    pub fn sign(&self, digest: &Hash) -> Signature {
        let signature: EcdsaSignature = self
            .0
            .sign_prehash(digest.as_bytes())
            .expect("signing a 32-byte prehash cannot fail");
        Signature(signature)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(..)")
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError)
    }

    /// SEC1 compressed encoding (33 bytes).
    pub fn to_sec1_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(&self.0.to_sec1_bytes());
        bytes
    }

    pub fn verify(&self, digest: &Hash, signature: &Signature) -> bool {
        self.0.verify_prehash(digest.as_bytes(), &signature.0).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{})", hex::encode(self.to_sec1_bytes()))
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Signature(EcdsaSignature);

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        EcdsaSignature::from_slice(bytes)
            .map(Self)
            .map_err(|_| KeyError)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes.copy_from_slice(&self.0.to_bytes());
        bytes
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.to_bytes()))
    }
}

/// An opaque 64-byte signature carried through without verification.
///
/// Block and enrollment signatures fall under the "structural checks only"
/// rule; the bytes round-trip but are never interpreted.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct RawSignature(pub [u8; SIGNATURE_LENGTH]);

impl RawSignature {
    pub const ZERO: Self = Self([0; SIGNATURE_LENGTH]);

    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; SIGNATURE_LENGTH] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl Default for RawSignature {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<Signature> for RawSignature {
    fn from(signature: Signature) -> Self {
        Self(signature.to_bytes())
    }
}

impl fmt::Debug for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSignature(0x{})", hex::encode(self.0))
    }
}

impl Serialize for RawSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for RawSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        hex::decode_to_slice(s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::hash::hash;

    #[test]
    fn test_sign_verify_round_trip() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(1));
        let digest = hash(b"message");

        let signature = key.sign(&digest);
        assert!(key.public_key().verify(&digest, &signature));
        assert!(!key.public_key().verify(&hash(b"other"), &signature));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let mut rng = StdRng::seed_from_u64(2);
        let signer = PrivateKey::generate(&mut rng);
        let other = PrivateKey::generate(&mut rng);
        let digest = hash(b"message");

        let signature = signer.sign(&digest);
        assert!(!other.public_key().verify(&digest, &signature));
    }

    #[test]
    fn test_public_key_sec1_round_trip() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(3));
        let sec1 = key.public_key().to_sec1_bytes();
        let back = PublicKey::from_sec1_bytes(&sec1).unwrap();
        assert_eq!(back, key.public_key());
    }

    #[test]
    fn test_signature_compact_round_trip() {
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(4));
        let signature = key.sign(&hash(b"compact"));
        let back = Signature::from_slice(&signature.to_bytes()).unwrap();
        assert_eq!(back, signature);
    }
}
