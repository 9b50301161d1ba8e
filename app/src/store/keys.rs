//! Ordered key encodings for the store tables.
//!
//! Heights are big-endian so byte order equals numeric order and range
//! scans walk the chain; composite keys concatenate fixed-width fields,
//! with the one variable-width component (proposal ids) length-prefixed so
//! keys of one proposal never interleave with another's.

use core::cmp::Ordering;

use basilica_types::{Address, Hash, Height};

/// `Height`, 8 bytes big-endian.
#[derive(Debug)]
pub struct HeightKey;

impl redb::Value for HeightKey {
    type SelfType<'a> = Height;
    type AsBytes<'a> = [u8; 8];

    fn fixed_width() -> Option<usize> {
        Some(8)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        Height::new(u64::from_be_bytes(data.try_into().expect("height key is 8 bytes")))
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        value.as_u64().to_be_bytes()
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::HeightKey")
    }
}

impl redb::Key for HeightKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `Hash`, 32 raw bytes in canonical orientation.
#[derive(Debug)]
pub struct HashKey;

impl redb::Value for HashKey {
    type SelfType<'a> = Hash;
    type AsBytes<'a> = [u8; Hash::LENGTH];

    fn fixed_width() -> Option<usize> {
        Some(Hash::LENGTH)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        Hash::new(data.try_into().expect("hash key is 32 bytes"))
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        *value.as_bytes()
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::HashKey")
    }
}

impl redb::Key for HashKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `Address`, 20 raw bytes.
#[derive(Debug)]
pub struct AddressKey;

impl redb::Value for AddressKey {
    type SelfType<'a> = Address;
    type AsBytes<'a> = [u8; Address::LENGTH];

    fn fixed_width() -> Option<usize> {
        Some(Address::LENGTH)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        Address::new(data.try_into().expect("address key is 20 bytes"))
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        *value.as_bytes()
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::AddressKey")
    }
}

impl redb::Key for AddressKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `(Height, tx_index)`, 12 bytes big-endian: chain order.
#[derive(Debug)]
pub struct TxLocKey;

impl redb::Value for TxLocKey {
    type SelfType<'a> = (Height, u32);
    type AsBytes<'a> = [u8; 12];

    fn fixed_width() -> Option<usize> {
        Some(12)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let height = u64::from_be_bytes(data[..8].try_into().expect("tx key height"));
        let index = u32::from_be_bytes(data[8..].try_into().expect("tx key index"));
        (Height::new(height), index)
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        let mut bytes = [0u8; 12];
        bytes[..8].copy_from_slice(&value.0.as_u64().to_be_bytes());
        bytes[8..].copy_from_slice(&value.1.to_be_bytes());
        bytes
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::TxLocKey")
    }
}

impl redb::Key for TxLocKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `(Address, utxo_key)`: the per-address UTXO index.
#[derive(Debug)]
pub struct AddressUtxoKey;

impl redb::Value for AddressUtxoKey {
    type SelfType<'a> = (Address, Hash);
    type AsBytes<'a> = [u8; Address::LENGTH + Hash::LENGTH];

    fn fixed_width() -> Option<usize> {
        Some(Address::LENGTH + Hash::LENGTH)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let (addr, hash) = data.split_at(Address::LENGTH);
        (
            Address::new(addr.try_into().expect("address part")),
            Hash::new(hash.try_into().expect("hash part")),
        )
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        let mut bytes = [0u8; Address::LENGTH + Hash::LENGTH];
        bytes[..Address::LENGTH].copy_from_slice(value.0.as_bytes());
        bytes[Address::LENGTH..].copy_from_slice(value.1.as_bytes());
        bytes
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::AddressUtxoKey")
    }
}

impl redb::Key for AddressUtxoKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `(Address, Height, tx_index)`: wallet history in chain order per address.
#[derive(Debug)]
pub struct AddressTxKey;

impl redb::Value for AddressTxKey {
    type SelfType<'a> = (Address, Height, u32);
    type AsBytes<'a> = [u8; Address::LENGTH + 12];

    fn fixed_width() -> Option<usize> {
        Some(Address::LENGTH + 12)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let address = Address::new(data[..Address::LENGTH].try_into().expect("address part"));
        let height = u64::from_be_bytes(
            data[Address::LENGTH..Address::LENGTH + 8]
                .try_into()
                .expect("height part"),
        );
        let index = u32::from_be_bytes(
            data[Address::LENGTH + 8..]
                .try_into()
                .expect("index part"),
        );
        (address, Height::new(height), index)
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        let mut bytes = [0u8; Address::LENGTH + 12];
        bytes[..Address::LENGTH].copy_from_slice(value.0.as_bytes());
        bytes[Address::LENGTH..Address::LENGTH + 8]
            .copy_from_slice(&value.1.as_u64().to_be_bytes());
        bytes[Address::LENGTH + 8..].copy_from_slice(&value.2.to_be_bytes());
        bytes
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::AddressTxKey")
    }
}

impl redb::Key for AddressTxKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// `(utxo_key, enrolled_at)`: enrollment history per stake.
#[derive(Debug)]
pub struct EnrollKey;

impl redb::Value for EnrollKey {
    type SelfType<'a> = (Hash, Height);
    type AsBytes<'a> = [u8; Hash::LENGTH + 8];

    fn fixed_width() -> Option<usize> {
        Some(Hash::LENGTH + 8)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let (hash, height) = data.split_at(Hash::LENGTH);
        (
            Hash::new(hash.try_into().expect("utxo part")),
            Height::new(u64::from_be_bytes(height.try_into().expect("height part"))),
        )
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        let mut bytes = [0u8; Hash::LENGTH + 8];
        bytes[..Hash::LENGTH].copy_from_slice(value.0.as_bytes());
        bytes[Hash::LENGTH..].copy_from_slice(&value.1.as_u64().to_be_bytes());
        bytes
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::EnrollKey")
    }
}

impl redb::Key for EnrollKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

/// Location of one ballot: `(proposal_id, validator, height, tx_index)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotLoc {
    pub proposal_id: String,
    pub validator: Address,
    pub height: Height,
    pub tx_index: u32,
}

impl BallotLoc {
    /// Lower bound of a proposal's key range.
    pub fn range_start(proposal_id: &str) -> Self {
        Self {
            proposal_id: proposal_id.to_owned(),
            validator: Address::new([0; Address::LENGTH]),
            height: Height::GENESIS,
            tx_index: 0,
        }
    }

    /// Upper bound (inclusive) of a proposal's key range.
    pub fn range_end(proposal_id: &str) -> Self {
        Self {
            proposal_id: proposal_id.to_owned(),
            validator: Address::new([0xff; Address::LENGTH]),
            height: Height::new(u64::MAX),
            tx_index: u32::MAX,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let id = self.proposal_id.as_bytes();
        let mut bytes = Vec::with_capacity(2 + id.len() + Address::LENGTH + 12);
        bytes.extend_from_slice(&(id.len() as u16).to_be_bytes());
        bytes.extend_from_slice(id);
        bytes.extend_from_slice(self.validator.as_bytes());
        bytes.extend_from_slice(&self.height.as_u64().to_be_bytes());
        bytes.extend_from_slice(&self.tx_index.to_be_bytes());
        bytes
    }

    fn decode(data: &[u8]) -> Self {
        let id_len = u16::from_be_bytes(data[..2].try_into().expect("ballot id length")) as usize;
        let id_end = 2 + id_len;
        let proposal_id =
            String::from_utf8(data[2..id_end].to_vec()).expect("ballot key id is utf-8");
        let validator = Address::new(
            data[id_end..id_end + Address::LENGTH]
                .try_into()
                .expect("ballot validator"),
        );
        let height = u64::from_be_bytes(
            data[id_end + Address::LENGTH..id_end + Address::LENGTH + 8]
                .try_into()
                .expect("ballot height"),
        );
        let tx_index = u32::from_be_bytes(
            data[id_end + Address::LENGTH + 8..]
                .try_into()
                .expect("ballot index"),
        );
        Self {
            proposal_id,
            validator,
            height: Height::new(height),
            tx_index,
        }
    }
}

#[derive(Debug)]
pub struct BallotKey;

impl redb::Value for BallotKey {
    type SelfType<'a> = BallotLoc;
    type AsBytes<'a> = Vec<u8>;

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        BallotLoc::decode(data)
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a> {
        value.encode()
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("basilica::BallotKey")
    }
}

impl redb::Key for BallotKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}
