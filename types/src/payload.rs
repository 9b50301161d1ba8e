//! Tagged binary payloads carried inside transactions.
//!
//! Governance interprets three payload shapes, each starting with an
//! 8-byte ASCII tag. Variable-length fields are `u32-le length || bytes`,
//! integers are little-endian fixed width, hashes are raw 32 bytes, public
//! keys are SEC1 compressed 33 bytes and signatures are raw 64 bytes.
//! Anything else is [`PayloadKind::Unknown`] and invisible to governance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;
use crate::hash::{hash_multi, Hash};
use crate::height::Height;
use crate::signing::{RawSignature, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

pub const TAG_LENGTH: usize = 8;
pub const PROPOSAL_FEE_TAG: &[u8; TAG_LENGTH] = b"PROP-FEE";
pub const PROPOSAL_TAG: &[u8; TAG_LENGTH] = b"PROPOSAL";
pub const BALLOT_TAG: &[u8; TAG_LENGTH] = b"BALLOT  ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadDecodeError {
    #[error("payload truncated at offset {0}")]
    Truncated(usize),

    #[error("length prefix {0} exceeds remaining payload")]
    BadLength(u32),

    #[error("field is not valid utf-8")]
    BadUtf8,

    #[error("unknown proposal type {0}")]
    BadProposalType(u8),

    #[error("trailing bytes after payload")]
    TrailingBytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    ProposalFee(ProposalFeePayload),
    Proposal(ProposalPayload),
    Ballot(BallotPayload),
    Unknown,
}

/// Classifies raw payload bytes. Tagged payloads that fail to decode are
/// `Unknown`: the transaction still commits, governance just ignores it.
pub fn decode_payload(bytes: &[u8]) -> PayloadKind {
    if bytes.len() < TAG_LENGTH {
        return PayloadKind::Unknown;
    }
    let (tag, body) = bytes.split_at(TAG_LENGTH);

    let decoded = if tag == PROPOSAL_FEE_TAG {
        ProposalFeePayload::decode(body).map(PayloadKind::ProposalFee)
    } else if tag == PROPOSAL_TAG {
        ProposalPayload::decode(body).map(PayloadKind::Proposal)
    } else if tag == BALLOT_TAG {
        BallotPayload::decode(body).map(PayloadKind::Ballot)
    } else {
        return PayloadKind::Unknown;
    };

    decoded.unwrap_or(PayloadKind::Unknown)
}

/// Marks a fee payment for a proposal that will be declared later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFeePayload {
    pub app_name: String,
    pub proposal_id: String,
}

impl ProposalFeePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::from(*PROPOSAL_FEE_TAG);
        put_str(&mut buf, &self.app_name);
        put_str(&mut buf, &self.proposal_id);
        buf
    }

    fn decode(body: &[u8]) -> Result<Self, PayloadDecodeError> {
        let mut r = Reader::new(body);
        let payload = Self {
            app_name: r.take_str()?,
            proposal_id: r.take_str()?,
        };
        r.finish()?;
        Ok(payload)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalType {
    System,
    Fund,
}

impl ProposalType {
    fn code(&self) -> u8 {
        match self {
            Self::System => 0,
            Self::Fund => 1,
        }
    }

    fn from_code(code: u8) -> Result<Self, PayloadDecodeError> {
        match code {
            0 => Ok(Self::System),
            1 => Ok(Self::Fund),
            other => Err(PayloadDecodeError::BadProposalType(other)),
        }
    }
}

/// The proposal declaration itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPayload {
    pub app_name: String,
    pub proposal_type: ProposalType,
    pub proposal_id: String,
    pub title: String,
    pub vote_start_height: Height,
    pub vote_end_height: Height,
    pub doc_hash: Hash,
    pub fund_amount: Amount,
    pub proposal_fee: Amount,
    pub vote_fee: Amount,
    pub fee_tx_hash: Hash,
    pub proposer_address: Address,
    pub fee_destination: Address,
}

impl ProposalPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::from(*PROPOSAL_TAG);
        put_str(&mut buf, &self.app_name);
        buf.push(self.proposal_type.code());
        put_str(&mut buf, &self.proposal_id);
        put_str(&mut buf, &self.title);
        buf.extend_from_slice(&self.vote_start_height.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.vote_end_height.as_u64().to_le_bytes());
        buf.extend_from_slice(self.doc_hash.as_bytes());
        buf.extend_from_slice(&self.fund_amount.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.proposal_fee.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.vote_fee.as_u64().to_le_bytes());
        buf.extend_from_slice(self.fee_tx_hash.as_bytes());
        buf.extend_from_slice(self.proposer_address.as_bytes());
        buf.extend_from_slice(self.fee_destination.as_bytes());
        buf
    }

    fn decode(body: &[u8]) -> Result<Self, PayloadDecodeError> {
        let mut r = Reader::new(body);
        let payload = Self {
            app_name: r.take_str()?,
            proposal_type: ProposalType::from_code(r.take_u8()?)?,
            proposal_id: r.take_str()?,
            title: r.take_str()?,
            vote_start_height: Height::new(r.take_u64()?),
            vote_end_height: Height::new(r.take_u64()?),
            doc_hash: r.take_hash()?,
            fund_amount: Amount::new(r.take_u64()?),
            proposal_fee: Amount::new(r.take_u64()?),
            vote_fee: Amount::new(r.take_u64()?),
            fee_tx_hash: r.take_hash()?,
            proposer_address: r.take_address()?,
            fee_destination: r.take_address()?,
        };
        r.finish()?;
        Ok(payload)
    }
}

/// Delegation record: the validator key authorizes a one-shot temporary
/// key to sign a ballot. Keys stay raw here; they are parsed (and may fail
/// to parse) at verification time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCard {
    #[serde(with = "hex::serde")]
    pub validator_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub temporary_key: Vec<u8>,
    pub expires: String,
    pub signature: RawSignature,
}

impl VoterCard {
    /// Digest the validator key signs: the delegated key plus expiry.
    pub fn digest(&self) -> Hash {
        hash_multi(&[&self.temporary_key, self.expires.as_bytes()])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPayload {
    pub app_name: String,
    pub proposal_id: String,
    #[serde(with = "hex::serde")]
    pub encrypted_answer: Vec<u8>,
    pub voter_card: VoterCard,
    pub sequence: u32,
    pub signature: RawSignature,
}

impl BallotPayload {
    /// Digest the temporary key signs.
    pub fn digest(&self) -> Hash {
        hash_multi(&[
            self.app_name.as_bytes(),
            self.proposal_id.as_bytes(),
            &self.encrypted_answer,
            &self.sequence.to_le_bytes(),
        ])
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::from(*BALLOT_TAG);
        put_str(&mut buf, &self.app_name);
        put_str(&mut buf, &self.proposal_id);
        put_bytes(&mut buf, &self.encrypted_answer);
        buf.extend_from_slice(&self.voter_card.validator_key);
        buf.extend_from_slice(&self.voter_card.temporary_key);
        put_str(&mut buf, &self.voter_card.expires);
        buf.extend_from_slice(self.voter_card.signature.as_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(self.signature.as_bytes());
        buf
    }

    fn decode(body: &[u8]) -> Result<Self, PayloadDecodeError> {
        let mut r = Reader::new(body);
        let app_name = r.take_str()?;
        let proposal_id = r.take_str()?;
        let encrypted_answer = r.take_lp_bytes()?;
        let voter_card = VoterCard {
            validator_key: r.take_bytes(PUBLIC_KEY_LENGTH)?.to_vec(),
            temporary_key: r.take_bytes(PUBLIC_KEY_LENGTH)?.to_vec(),
            expires: r.take_str()?,
            signature: r.take_signature()?,
        };
        let payload = Self {
            app_name,
            proposal_id,
            encrypted_answer,
            voter_card,
            sequence: r.take_u32()?,
            signature: r.take_signature()?,
        };
        r.finish()?;
        Ok(payload)
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_len(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8], PayloadDecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(PayloadDecodeError::Truncated(self.pos))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_u8(&mut self) -> Result<u8, PayloadDecodeError> {
        Ok(self.take_bytes(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, PayloadDecodeError> {
        let bytes: [u8; 4] = self.take_bytes(4)?.try_into().expect("length checked");
        Ok(u32::from_le_bytes(bytes))
    }

    fn take_u64(&mut self) -> Result<u64, PayloadDecodeError> {
        let bytes: [u8; 8] = self.take_bytes(8)?.try_into().expect("length checked");
        Ok(u64::from_le_bytes(bytes))
    }

    fn take_lp_bytes(&mut self) -> Result<Vec<u8>, PayloadDecodeError> {
        let len = self.take_u32()?;
        if len as usize > self.buf.len() - self.pos {
            return Err(PayloadDecodeError::BadLength(len));
        }
        Ok(self.take_bytes(len as usize)?.to_vec())
    }

    fn take_str(&mut self) -> Result<String, PayloadDecodeError> {
        let bytes = self.take_lp_bytes()?;
        String::from_utf8(bytes).map_err(|_| PayloadDecodeError::BadUtf8)
    }

    fn take_hash(&mut self) -> Result<Hash, PayloadDecodeError> {
        let bytes: [u8; Hash::LENGTH] =
            self.take_bytes(Hash::LENGTH)?.try_into().expect("length checked");
        Ok(Hash::new(bytes))
    }

    fn take_address(&mut self) -> Result<Address, PayloadDecodeError> {
        let bytes: [u8; Address::LENGTH] = self
            .take_bytes(Address::LENGTH)?
            .try_into()
            .expect("length checked");
        Ok(Address::new(bytes))
    }

    fn take_signature(&mut self) -> Result<RawSignature, PayloadDecodeError> {
        let bytes: [u8; SIGNATURE_LENGTH] = self
            .take_bytes(SIGNATURE_LENGTH)?
            .try_into()
            .expect("length checked");
        Ok(RawSignature(bytes))
    }

    fn finish(self) -> Result<(), PayloadDecodeError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(PayloadDecodeError::TrailingBytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn sample_proposal() -> ProposalPayload {
        ProposalPayload {
            app_name: "votera".into(),
            proposal_type: ProposalType::Fund,
            proposal_id: "469008972006".into(),
            title: "Fund the harbor".into(),
            vote_start_height: Height::new(10),
            vote_end_height: Height::new(15),
            doc_hash: hash(b"doc"),
            fund_amount: Amount::new(10_000_000),
            proposal_fee: Amount::new(100_000),
            vote_fee: Amount::new(100),
            fee_tx_hash: hash(b"fee-tx"),
            proposer_address: Address::new([3; 20]),
            fee_destination: Address::new([4; 20]),
        }
    }

    fn sample_ballot() -> BallotPayload {
        BallotPayload {
            app_name: "votera".into(),
            proposal_id: "469008972006".into(),
            encrypted_answer: vec![1, 2, 3, 4],
            voter_card: VoterCard {
                validator_key: vec![2; PUBLIC_KEY_LENGTH],
                temporary_key: vec![3; PUBLIC_KEY_LENGTH],
                expires: "2026-12-31T00:00:00Z".into(),
                signature: RawSignature([5; 64]),
            },
            sequence: 7,
            signature: RawSignature([6; 64]),
        }
    }

    #[test]
    fn test_proposal_fee_round_trip() {
        let fee = ProposalFeePayload {
            app_name: "votera".into(),
            proposal_id: "42".into(),
        };
        match decode_payload(&fee.encode()) {
            PayloadKind::ProposalFee(decoded) => assert_eq!(decoded, fee),
            other => panic!("unexpected payload kind: {other:?}"),
        }
    }

    #[test]
    fn test_proposal_round_trip() {
        let proposal = sample_proposal();
        match decode_payload(&proposal.encode()) {
            PayloadKind::Proposal(decoded) => assert_eq!(decoded, proposal),
            other => panic!("unexpected payload kind: {other:?}"),
        }
    }

    #[test]
    fn test_ballot_round_trip() {
        let ballot = sample_ballot();
        match decode_payload(&ballot.encode()) {
            PayloadKind::Ballot(decoded) => assert_eq!(decoded, ballot),
            other => panic!("unexpected payload kind: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_payloads_are_ignored() {
        assert_eq!(decode_payload(b""), PayloadKind::Unknown);
        assert_eq!(decode_payload(b"short"), PayloadKind::Unknown);
        assert_eq!(decode_payload(b"NOT-A-TAGmore"), PayloadKind::Unknown);
    }

    #[test]
    fn test_truncated_tagged_payload_is_unknown() {
        let mut bytes = sample_proposal().encode();
        bytes.truncate(bytes.len() - 5);
        assert_eq!(decode_payload(&bytes), PayloadKind::Unknown);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample_ballot().encode();
        bytes.push(0);
        assert_eq!(decode_payload(&bytes), PayloadKind::Unknown);
    }

    #[test]
    fn test_ballot_digest_covers_sequence() {
        let ballot = sample_ballot();
        let mut revote = ballot.clone();
        revote.sequence += 1;
        assert_ne!(ballot.digest(), revote.digest());
    }
}
