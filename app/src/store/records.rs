//! Row types persisted by the store. All values are serialized as JSON;
//! ordering lives in the keys, not here.

use basilica_types::payload::ProposalPayload;
use basilica_types::{Address, Amount, BlockHeader, Hash, Height, Lock, Transaction, TxType};
use serde::{Deserialize, Serialize};

use crate::governance::{BallotDisposition, ProposalMetadata, ProposalResult, ProposalStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub hash: Hash,
    pub header: BlockHeader,
    /// Wall-clock seconds: `genesis + height * interval + time_offset`.
    pub time_stamp: u64,
    pub tx_hashes: Vec<Hash>,
    pub total_sent: Amount,
    pub total_fees: Amount,
}

impl BlockRecord {
    pub fn height(&self) -> Height {
        self.header.height
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: Hash,
    pub height: Height,
    pub index: u32,
    pub tx: Transaction,
    pub fee: Amount,
    pub size: u64,
    pub time_stamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub utxo_key: Hash,
    pub tx_hash: Hash,
    pub output_index: u32,
    /// `None` for non-key locks; those outputs are tracked but unowned.
    pub address: Option<Address>,
    pub amount: Amount,
    pub tx_type: TxType,
    pub unlock_height: Height,
    pub lock: Lock,
    pub created_at: Height,
    pub spent_at: Option<Height>,
}

/// One enrollment and the pre-image chain anchored at it.
///
/// Keyed by `(utxo_key, enrolled_at)`, so a re-enrollment starts a new row
/// and the retired chain stays derivable for heights it covered. The tip
/// starts at the commitment (`tip_height == enrolled_at`) and only moves
/// forward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub utxo_key: Hash,
    pub address: Address,
    pub commitment: Hash,
    pub cycle_length: u64,
    pub enrolled_at: Height,
    /// Position within the enrolling block's header list.
    pub slot_index: u32,
    pub tip_hash: Hash,
    pub tip_height: Height,
}

impl EnrollmentRecord {
    /// Pre-image for `height`, derived from the published tip. `None` when
    /// the tip has not reached `height` or the chain does not cover it.
    pub fn preimage_at(&self, height: Height) -> Option<Hash> {
        if height < self.enrolled_at || height.as_u64() > self.enrolled_at.as_u64() + self.cycle_length
        {
            return None;
        }
        basilica_types::preimage::preimage_at(&self.tip_hash, self.tip_height, height)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryDirection {
    Inbound,
    Outbound,
    Freeze,
    Payload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tx_hash: Hash,
    pub direction: HistoryDirection,
    pub peer: Option<Address>,
    pub amount: Amount,
    pub time_stamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMarkerRecord {
    pub app_name: String,
    pub proposal_id: String,
    pub tx_hash: Hash,
    pub height: Height,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub payload: ProposalPayload,
    pub tx_hash: Hash,
    pub created_at: Height,
    pub status: ProposalStatus,
    pub result: ProposalResult,
    pub yes_count: u64,
    pub no_count: u64,
    pub blank_count: u64,
    pub reject_count: u64,
    /// Committee size at `vote_start_height`, fixed at the tally.
    pub committee_size: u64,
    pub metadata: Option<ProposalMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub proposal_id: String,
    pub validator: Address,
    pub height: Height,
    pub tx_index: u32,
    pub tx_hash: Hash,
    pub sequence: u32,
    #[serde(with = "hex::serde")]
    pub encrypted_answer: Vec<u8>,
    pub disposition: BallotDisposition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTxRecord {
    pub hash: Hash,
    pub tx: Transaction,
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub spendable: Amount,
    pub frozen: Amount,
}

impl BalanceRecord {
    pub fn total(&self) -> Amount {
        self.spendable + self.frozen
    }
}

/// One validator as reported by the `/validators` endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorView {
    pub address: Address,
    pub utxo_key: Hash,
    pub stake: Amount,
    pub enrolled_at: Height,
    pub cycle_length: u64,
    pub preimage_hash: Hash,
    pub preimage_height: Height,
}

/// Aggregate counters surfaced by `/boa-stats` and the stats events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub height: Height,
    pub tx_count: u64,
    pub total_supply: Amount,
    pub frozen_supply: Amount,
    pub validator_count: u64,
}
