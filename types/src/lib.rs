//! Domain types for the basilica indexer: the chain data model, payload
//! codec, pre-image chains and the crypto oracles the core relies on.

mod address;
mod amount;
mod block;
pub mod crypto;
mod hash;
mod height;
pub mod payload;
pub mod preimage;
mod signing;

pub use address::{Address, AddressParseError};
pub use amount::Amount;
pub use block::{
    fold_merkle_path, merkle_path, merkle_root, utxo_key, Block, BlockHeader, Enrollment, Lock,
    LockType, Transaction, TxInput, TxOutput, TxType,
};
pub use hash::{hash, hash_multi, Hash, HashParseError};
pub use height::Height;
pub use payload::{decode_payload, PayloadKind};
pub use preimage::PreImageInfo;
pub use signing::{
    KeyError, PrivateKey, PublicKey, RawSignature, Signature, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
