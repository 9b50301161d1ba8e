//! Blocks, transactions and enrollments as externalized by the Agora node.
//!
//! JSON serde mirrors the node's wire form; hashing runs over a canonical
//! little-endian binary encoding so `tx_hash` and `block.hash` are
//! deterministic from contents alone. Header signatures are excluded from
//! the header hash.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::hash::{hash, hash_multi, Hash};
use crate::height::Height;
use crate::signing::RawSignature;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Payment,
    Freeze,
    Coinbase,
}

impl TxType {
    fn code(&self) -> u8 {
        match self {
            Self::Payment => 0,
            Self::Freeze => 1,
            Self::Coinbase => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockType {
    Key,
    KeyHash,
    Script,
    Redeem,
}

impl LockType {
    fn code(&self) -> u8 {
        match self {
            Self::Key => 0,
            Self::KeyHash => 1,
            Self::Script => 2,
            Self::Redeem => 3,
        }
    }
}

/// Spend condition attached to an output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    #[serde(rename = "type")]
    pub lock_type: LockType,
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

impl Lock {
    pub fn key(address: Address) -> Self {
        Self {
            lock_type: LockType::Key,
            bytes: address.as_bytes().to_vec(),
        }
    }

    /// The owning address, when the lock is a plain key lock.
    pub fn address(&self) -> Option<Address> {
        if self.lock_type != LockType::Key {
            return None;
        }
        let bytes: [u8; Address::LENGTH] = self.bytes.as_slice().try_into().ok()?;
        Some(Address::new(bytes))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Key of the UTXO being consumed.
    pub utxo: Hash,
    #[serde(with = "hex::serde", default)]
    pub unlock: Vec<u8>,
}

impl TxInput {
    pub fn new(utxo: Hash) -> Self {
        Self {
            utxo,
            unlock: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: Amount,
    pub lock: Lock,
}

impl TxOutput {
    pub fn to_address(amount: Amount, address: Address) -> Self {
        Self {
            amount,
            lock: Lock::key(address),
        }
    }

    pub fn address(&self) -> Option<Address> {
        self.lock.address()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    #[serde(with = "hex::serde", default)]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub lock_height: Height,
}

impl Transaction {
    pub fn new(tx_type: TxType, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            tx_type,
            inputs,
            outputs,
            payload: Vec::new(),
            lock_height: Height::GENESIS,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_type == TxType::Coinbase
    }

    pub fn hash(&self) -> Hash {
        hash(&self.encode())
    }

    /// Size of the canonical encoding in bytes; the fee endpoints rate by
    /// this figure.
    pub fn size(&self) -> usize {
        self.encode().len()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.tx_type.code());

        put_len(&mut buf, self.inputs.len());
        for input in &self.inputs {
            buf.extend_from_slice(input.utxo.as_bytes());
            put_bytes(&mut buf, &input.unlock);
        }

        put_len(&mut buf, self.outputs.len());
        for output in &self.outputs {
            buf.extend_from_slice(&output.amount.as_u64().to_le_bytes());
            buf.push(output.lock.lock_type.code());
            put_bytes(&mut buf, &output.lock.bytes);
        }

        put_bytes(&mut buf, &self.payload);
        buf.extend_from_slice(&self.lock_height.as_u64().to_le_bytes());
        buf
    }
}

/// Key under which an output is tracked once committed.
pub fn utxo_key(tx_hash: &Hash, output_index: u32) -> Hash {
    hash_multi(&[tx_hash.as_bytes(), &output_index.to_le_bytes()])
}

/// A validator's commitment to serve for `cycle_length` blocks, staked on a
/// frozen UTXO.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub utxo_key: Hash,
    pub commitment: Hash,
    pub cycle_length: u64,
    #[serde(default)]
    pub enroll_sig: RawSignature,
}

impl Enrollment {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.utxo_key.as_bytes());
        buf.extend_from_slice(self.commitment.as_bytes());
        buf.extend_from_slice(&self.cycle_length.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_block: Hash,
    pub height: Height,
    pub merkle_root: Hash,
    pub random_seed: Hash,
    #[serde(default)]
    pub signature: RawSignature,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    /// One entry per committee slot in canonical address order; the
    /// zero-hash stands in for a validator whose pre-image is unknown.
    #[serde(default)]
    pub preimages: Vec<Hash>,
    #[serde(default)]
    pub time_offset: u64,
}

impl BlockHeader {
    /// Header hash over the canonical encoding, signature excluded.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.prev_block.as_bytes());
        buf.extend_from_slice(&self.height.as_u64().to_le_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        buf.extend_from_slice(self.random_seed.as_bytes());
        buf.extend_from_slice(&self.time_offset.to_le_bytes());

        put_len(&mut buf, self.enrollments.len());
        for enrollment in &self.enrollments {
            enrollment.encode(&mut buf);
        }

        put_len(&mut buf, self.preimages.len());
        for preimage in &self.preimages {
            buf.extend_from_slice(preimage.as_bytes());
        }

        hash(&buf)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn tx_hashes(&self) -> Vec<Hash> {
        self.txs.iter().map(Transaction::hash).collect()
    }

    /// Whether the header's merkle root matches the transactions carried.
    pub fn merkle_root_matches(&self) -> bool {
        merkle_root(&self.tx_hashes()) == self.header.merkle_root
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_len(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

/// Root of the pairwise merkle tree over `leaves`; the last node is paired
/// with itself on odd levels. Empty input yields the zero hash.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = *pair.get(1).unwrap_or(&left);
                hash_multi(&[left.as_bytes(), right.as_bytes()])
            })
            .collect();
    }
    level[0]
}

/// Sibling hashes from the leaf at `index` up to the root.
pub fn merkle_path(leaves: &[Hash], mut index: usize) -> Vec<Hash> {
    let mut path = Vec::new();
    let mut level = leaves.to_vec();

    while level.len() > 1 {
        let sibling = index ^ 1;
        path.push(*level.get(sibling).unwrap_or(&level[index]));

        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = *pair.get(1).unwrap_or(&left);
                hash_multi(&[left.as_bytes(), right.as_bytes()])
            })
            .collect();
        index >>= 1;
    }
    path
}

/// Folds an audit path bottom-up; the low bit of `index` picks the pair
/// order at each level. Returns the implied root.
pub fn fold_merkle_path(leaf: Hash, mut index: u64, path: &[Hash]) -> Hash {
    let mut current = leaf;
    for sibling in path {
        current = if index & 1 == 0 {
            hash_multi(&[current.as_bytes(), sibling.as_bytes()])
        } else {
            hash_multi(&[sibling.as_bytes(), current.as_bytes()])
        };
        index >>= 1;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<Hash> {
        (0..n).map(|i| hash(&i.to_le_bytes())).collect()
    }

    #[test]
    fn test_merkle_path_folds_to_root() {
        for n in 1..=9 {
            let leaves = leaves(n);
            let root = merkle_root(&leaves);
            for (i, leaf) in leaves.iter().enumerate() {
                let path = merkle_path(&leaves, i);
                assert_eq!(
                    fold_merkle_path(*leaf, i as u64, &path),
                    root,
                    "audit path must fold to the root (n={n}, i={i})"
                );
            }
        }
    }

    #[test]
    fn test_merkle_root_of_empty_is_zero() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);
    }

    #[test]
    fn test_merkle_fold_rejects_wrong_index() {
        let leaves = leaves(4);
        let root = merkle_root(&leaves);
        let path = merkle_path(&leaves, 0);
        assert_ne!(fold_merkle_path(leaves[0], 1, &path), root);
    }

    #[test]
    fn test_tx_hash_depends_on_contents() {
        let a = Transaction::new(
            TxType::Payment,
            vec![TxInput::new(hash(b"in"))],
            vec![TxOutput::to_address(Amount::new(10), Address::default())],
        );
        let mut b = a.clone();
        b.outputs[0].amount = Amount::new(11);

        assert_eq!(a.hash(), a.hash());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_header_hash_ignores_signature() {
        let mut header = BlockHeader {
            prev_block: Hash::ZERO,
            height: Height::new(1),
            merkle_root: hash(b"root"),
            random_seed: hash(b"seed"),
            signature: RawSignature::ZERO,
            enrollments: vec![],
            preimages: vec![],
            time_offset: 0,
        };
        let unsigned = header.hash();
        header.signature = RawSignature([1; 64]);
        assert_eq!(header.hash(), unsigned);
    }

    #[test]
    fn test_utxo_key_distinguishes_indexes() {
        let tx_hash = hash(b"tx");
        assert_ne!(utxo_key(&tx_hash, 0), utxo_key(&tx_hash, 1));
    }

    #[test]
    fn test_block_json_round_trip() {
        let tx = Transaction::new(
            TxType::Freeze,
            vec![TxInput::new(hash(b"frozen"))],
            vec![TxOutput::to_address(Amount::new(40_000), Address::new([7; 20]))],
        );
        let header = BlockHeader {
            prev_block: hash(b"prev"),
            height: Height::new(3),
            merkle_root: merkle_root(&[tx.hash()]),
            random_seed: hash(b"rand"),
            signature: RawSignature::ZERO,
            enrollments: vec![Enrollment {
                utxo_key: hash(b"stake"),
                commitment: hash(b"commit"),
                cycle_length: 20,
                enroll_sig: RawSignature::ZERO,
            }],
            preimages: vec![Hash::ZERO, hash(b"pi")],
            time_offset: 5,
        };
        let block = Block {
            header,
            txs: vec![tx],
        };

        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert!(back.merkle_root_matches());
    }
}
