//! Ballot sealing.
//!
//! An answer is sealed under a key only derivable from the validator's
//! pre-image at the end of the voting window, so ballots stay opaque until
//! validators have revealed that far. Sealed form:
//! `nonce(8) || ciphertext(1) || mac(16)`, keystream and MAC both drawn
//! from the Keccak oracle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{hash_multi, Hash};

pub const NONCE_LENGTH: usize = 8;
pub const MAC_LENGTH: usize = 16;
pub const SEALED_LENGTH: usize = NONCE_LENGTH + 1 + MAC_LENGTH;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    Yes,
    No,
    Blank,
}

impl VoteChoice {
    fn code(&self) -> u8 {
        match self {
            Self::Yes => 0,
            Self::No => 1,
            Self::Blank => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Yes),
            1 => Some(Self::No),
            2 => Some(Self::Blank),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnsealError {
    #[error("sealed ballot has wrong length: {0}")]
    Length(usize),

    #[error("authentication tag mismatch")]
    BadMac,

    #[error("decrypted answer out of range")]
    BadAnswer,
}

/// Derives the per-validator sealing key from the voting-window pre-image
/// digest and the proposal id.
pub fn encrypt_key_derive(first: &Hash, proposal_id: &str) -> Hash {
    hash_multi(&[first.as_bytes(), proposal_id.as_bytes()])
}

/// Seals `choice` under `key` with a caller-chosen nonce.
pub fn seal_answer(key: &Hash, choice: VoteChoice, nonce: &[u8; NONCE_LENGTH]) -> Vec<u8> {
    let keystream = hash_multi(&[key.as_bytes(), nonce]);
    let ciphertext = choice.code() ^ keystream.as_bytes()[0];

    let mac = hash_multi(&[key.as_bytes(), nonce, &[ciphertext]]);

    let mut sealed = Vec::with_capacity(SEALED_LENGTH);
    sealed.extend_from_slice(nonce);
    sealed.push(ciphertext);
    sealed.extend_from_slice(&mac.as_bytes()[..MAC_LENGTH]);
    sealed
}

/// Opens a sealed answer. Fails on wrong length, wrong key (MAC mismatch)
/// or a plaintext outside the answer set.
pub fn unseal_answer(key: &Hash, sealed: &[u8]) -> Result<VoteChoice, UnsealError> {
    if sealed.len() != SEALED_LENGTH {
        return Err(UnsealError::Length(sealed.len()));
    }
    let (nonce, rest) = sealed.split_at(NONCE_LENGTH);
    let (ciphertext, mac) = rest.split_at(1);

    let expected = hash_multi(&[key.as_bytes(), nonce, ciphertext]);
    if mac != &expected.as_bytes()[..MAC_LENGTH] {
        return Err(UnsealError::BadMac);
    }

    let keystream = hash_multi(&[key.as_bytes(), nonce]);
    VoteChoice::from_code(ciphertext[0] ^ keystream.as_bytes()[0]).ok_or(UnsealError::BadAnswer)
}
