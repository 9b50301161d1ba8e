#![allow(clippy::result_large_err)]

//! The ledger store: a durable, query-optimized projection of the chain.
//!
//! An inner synchronous [`Db`] owns the redb database and performs every
//! operation inside a single read or write transaction; the public
//! [`Store`] wraps it in an `Arc` and hops to the blocking pool. A block
//! commit is one write transaction covering the header, transactions,
//! UTXO set, enrollments, pre-image advances and all governance effects
//! triggered at that height, so readers always observe a whole height or
//! none of it.

pub mod keys;
pub mod records;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use basilica_types::payload::{BallotPayload, ProposalPayload};
use basilica_types::preimage::derive_preimage;
use basilica_types::{
    decode_payload, hash_multi, Address, Amount, Block, Hash, Height, PayloadKind, PreImageInfo,
    PublicKey, Transaction, TxType,
};
use redb::{ReadableTable, ReadableTableMetadata};
use thiserror::Error;

use keys::{
    AddressKey, AddressTxKey, AddressUtxoKey, BallotKey, BallotLoc, EnrollKey, HashKey, HeightKey,
    TxLocKey,
};
use records::{
    BalanceRecord, BallotRecord, BlockRecord, ChainStats, EnrollmentRecord, FeeMarkerRecord,
    HistoryDirection, HistoryRecord, PoolTxRecord, ProposalRecord, TxRecord, UtxoRecord,
    ValidatorView,
};

use crate::governance::{self, BallotDisposition, ProposalResult, ProposalStatus};
use crate::validator_set;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Failed to join on task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to serialize/deserialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("block height {got} does not match expected height {expected}")]
    HeightMismatch { expected: Height, got: Height },

    #[error("previous-block hash mismatch at height {height}")]
    PrevHashMismatch { height: Height },

    #[error("merkle root does not cover the block transactions at height {height}")]
    MerkleRootMismatch { height: Height },

    #[error("header pre-image vector has {got} entries, committee has {expected}")]
    PreimageVectorMismatch { expected: usize, got: usize },

    #[error("transaction input references unknown UTXO {utxo}")]
    MissingUtxo { utxo: Hash },

    #[error("transaction input double-spends UTXO {utxo}")]
    SpentUtxo { utxo: Hash },

    #[error("transaction {tx} outputs exceed its inputs")]
    NegativeFee { tx: Hash },
}

const BLOCKS_TABLE: redb::TableDefinition<'_, HeightKey, Vec<u8>> =
    redb::TableDefinition::new("blocks");

const BLOCK_HASHES_TABLE: redb::TableDefinition<'_, HashKey, u64> =
    redb::TableDefinition::new("block_hashes");

const TRANSACTIONS_TABLE: redb::TableDefinition<'_, TxLocKey, Vec<u8>> =
    redb::TableDefinition::new("transactions");

const TX_LOCATIONS_TABLE: redb::TableDefinition<'_, HashKey, (u64, u32)> =
    redb::TableDefinition::new("tx_locations");

const UTXOS_TABLE: redb::TableDefinition<'_, HashKey, Vec<u8>> =
    redb::TableDefinition::new("utxos");

const ADDRESS_UTXOS_TABLE: redb::TableDefinition<'_, AddressUtxoKey, ()> =
    redb::TableDefinition::new("address_utxos");

const ADDRESS_HISTORY_TABLE: redb::TableDefinition<'_, AddressTxKey, Vec<u8>> =
    redb::TableDefinition::new("address_history");

const ENROLLMENTS_TABLE: redb::TableDefinition<'_, EnrollKey, Vec<u8>> =
    redb::TableDefinition::new("enrollments");

const FEE_MARKERS_TABLE: redb::TableDefinition<'_, HashKey, Vec<u8>> =
    redb::TableDefinition::new("fee_markers");

const PROPOSALS_TABLE: redb::TableDefinition<'_, &str, Vec<u8>> =
    redb::TableDefinition::new("proposals");

const BALLOTS_TABLE: redb::TableDefinition<'_, BallotKey, Vec<u8>> =
    redb::TableDefinition::new("ballots");

const TX_POOL_TABLE: redb::TableDefinition<'_, HashKey, Vec<u8>> =
    redb::TableDefinition::new("tx_pool");

const BALANCES_TABLE: redb::TableDefinition<'_, AddressKey, Vec<u8>> =
    redb::TableDefinition::new("balances");

const CHAIN_STATS_TABLE: redb::TableDefinition<'_, &str, u64> =
    redb::TableDefinition::new("chain_stats");

const STAT_TX_COUNT: &str = "tx_count";
const STAT_TOTAL_SUPPLY: &str = "total_supply";
const STAT_FROZEN_SUPPLY: &str = "frozen_supply";

/// Protocol parameters the projection depends on.
#[derive(Clone, Debug)]
pub struct LedgerParams {
    pub genesis_timestamp: u64,
    pub block_interval: u64,
    pub validator_cycle: u64,
    pub governance_enabled: bool,
    pub grace_blocks: u64,
}

/// Everything a committed block fans out to subscribers.
#[derive(Clone, Debug)]
pub struct CommittedBlock {
    pub block: BlockRecord,
    pub txs: Vec<TxRecord>,
    /// Proposals materialized by this block, for metadata enrichment.
    pub created_proposals: Vec<String>,
    pub stats: ChainStats,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed { height: Height, block_hash: Hash },
    Pending,
    NotFound,
}

/// One page of query results plus the unpaginated total.
#[derive(Clone, Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Filters for the wallet history endpoint.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub direction: Option<HistoryDirection>,
    pub begin: Option<u64>,
    pub end: Option<u64>,
    pub peer: Option<Address>,
}

impl HistoryFilter {
    fn matches(&self, record: &HistoryRecord) -> bool {
        if self.direction.is_some_and(|d| d != record.direction) {
            return false;
        }
        if self.begin.is_some_and(|b| record.time_stamp < b) {
            return false;
        }
        if self.end.is_some_and(|e| record.time_stamp > e) {
            return false;
        }
        if self.peer.is_some() && self.peer != record.peer {
            return false;
        }
        true
    }
}

/// Selects a block by height or by hash.
#[derive(Clone, Copy, Debug)]
pub enum BlockSelector {
    Height(Height),
    Hash(Hash),
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn paginate<T>(items: Vec<T>, page: u64, page_size: u64) -> Paged<T> {
    let total = items.len() as u64;
    let start = (page - 1).saturating_mul(page_size) as usize;
    let items = items
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    Paged { items, total }
}

struct Db {
    db: redb::Database,
    params: LedgerParams,
}

impl Db {
    fn new(path: impl AsRef<Path>, params: LedgerParams) -> Result<Self, StoreError> {
        Ok(Self {
            db: redb::Database::create(path).map_err(StoreError::Database)?,
            params,
        })
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;

        // Implicitly creates the tables if they do not exist yet
        let _ = tx.open_table(BLOCKS_TABLE)?;
        let _ = tx.open_table(BLOCK_HASHES_TABLE)?;
        let _ = tx.open_table(TRANSACTIONS_TABLE)?;
        let _ = tx.open_table(TX_LOCATIONS_TABLE)?;
        let _ = tx.open_table(UTXOS_TABLE)?;
        let _ = tx.open_table(ADDRESS_UTXOS_TABLE)?;
        let _ = tx.open_table(ADDRESS_HISTORY_TABLE)?;
        let _ = tx.open_table(ENROLLMENTS_TABLE)?;
        let _ = tx.open_table(FEE_MARKERS_TABLE)?;
        let _ = tx.open_table(PROPOSALS_TABLE)?;
        let _ = tx.open_table(BALLOTS_TABLE)?;
        let _ = tx.open_table(TX_POOL_TABLE)?;
        let _ = tx.open_table(BALANCES_TABLE)?;
        let _ = tx.open_table(CHAIN_STATS_TABLE)?;

        tx.commit()?;
        Ok(())
    }

    fn block_time(&self, height: Height, time_offset: u64) -> u64 {
        self.params.genesis_timestamp + height.as_u64() * self.params.block_interval + time_offset
    }

    fn expected_next_height(&self) -> Result<Height, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(BLOCKS_TABLE)?;
        Self::next_height_in(&table)
    }

    fn next_height_in(
        table: &impl ReadableTable<HeightKey, Vec<u8>>,
    ) -> Result<Height, StoreError> {
        Ok(table
            .last()?
            .map(|(key, _)| key.value().increment())
            .unwrap_or(Height::GENESIS))
    }

    fn collect_enrollments(
        table: &impl ReadableTable<EnrollKey, Vec<u8>>,
    ) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            rows.push(from_json(&value.value())?);
        }
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Block commit
    // ------------------------------------------------------------------

    fn put_block(&self, block: &Block) -> Result<CommittedBlock, StoreError> {
        let height = block.header.height;
        let time_stamp = self.block_time(height, block.header.time_offset);

        let txn = self.db.begin_write()?;

        self.check_linkage(&txn, block)?;

        // Committee working on this block, as of the pre-block table
        // state. Enrollments carried by this block anchor at `height` and
        // only become active one past it.
        let committee = {
            let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            let rows = Self::collect_enrollments(&enrollments)?;
            validator_set::committee_at(height, &rows)
        };

        let applied = self.apply_transactions(&txn, block, time_stamp, &committee)?;
        self.apply_enrollments(&txn, block)?;
        self.apply_header_preimages(&txn, block, &committee)?;

        if self.params.governance_enabled {
            self.apply_status_transitions(&txn, height)?;
        }

        let stats = self.bump_stats(&txn, height, &applied)?;

        let record = BlockRecord {
            hash: block.hash(),
            header: block.header.clone(),
            time_stamp,
            tx_hashes: applied.txs.iter().map(|t| t.hash).collect(),
            total_sent: applied.total_sent,
            total_fees: applied.total_fees,
        };
        {
            let mut blocks = txn.open_table(BLOCKS_TABLE)?;
            blocks.insert(height, to_json(&record)?)?;
            let mut hashes = txn.open_table(BLOCK_HASHES_TABLE)?;
            hashes.insert(record.hash, height.as_u64())?;
        }

        txn.commit()?;

        Ok(CommittedBlock {
            block: record,
            txs: applied.txs,
            created_proposals: applied.created_proposals,
            stats,
        })
    }

    fn check_linkage(&self, txn: &redb::WriteTransaction, block: &Block) -> Result<(), StoreError> {
        let height = block.header.height;
        let blocks = txn.open_table(BLOCKS_TABLE)?;

        let expected = Self::next_height_in(&blocks)?;
        if height != expected {
            return Err(StoreError::HeightMismatch {
                expected,
                got: height,
            });
        }

        if let Some(prev) = height.as_u64().checked_sub(1) {
            let parent = blocks
                .get(Height::new(prev))?
                .map(|v| from_json::<BlockRecord>(&v.value()))
                .transpose()?
                .ok_or(StoreError::PrevHashMismatch { height })?;
            if parent.hash != block.header.prev_block {
                return Err(StoreError::PrevHashMismatch { height });
            }
        }

        if !block.merkle_root_matches() {
            return Err(StoreError::MerkleRootMismatch { height });
        }

        Ok(())
    }

    fn apply_transactions(
        &self,
        txn: &redb::WriteTransaction,
        block: &Block,
        time_stamp: u64,
        committee: &[EnrollmentRecord],
    ) -> Result<AppliedTxs, StoreError> {
        let height = block.header.height;
        let mut applied = AppliedTxs::default();

        for (index, tx) in block.txs.iter().enumerate() {
            let index = index as u32;
            let tx_hash = tx.hash();

            let (fee, flows) = self.apply_tx_flows(txn, tx, &tx_hash, height, &mut applied)?;

            let record = TxRecord {
                hash: tx_hash,
                height,
                index,
                tx: tx.clone(),
                fee,
                size: tx.size() as u64,
                time_stamp,
            };
            {
                let mut transactions = txn.open_table(TRANSACTIONS_TABLE)?;
                transactions.insert((height, index), to_json(&record)?)?;
                let mut locations = txn.open_table(TX_LOCATIONS_TABLE)?;
                locations.insert(tx_hash, (height.as_u64(), index))?;
                let mut pool = txn.open_table(TX_POOL_TABLE)?;
                pool.remove(tx_hash)?;
            }

            self.record_history(txn, &record, &flows)?;

            if self.params.governance_enabled {
                if let Some(created) = self.apply_governance_tx(txn, &record, committee)? {
                    applied.created_proposals.push(created);
                }
            }

            applied.total_fees += fee;
            applied.txs.push(record);
        }

        Ok(applied)
    }

    /// Consumes inputs, creates outputs, and updates balances. Returns the
    /// fee and the per-address flow map used for wallet history.
    fn apply_tx_flows(
        &self,
        txn: &redb::WriteTransaction,
        tx: &Transaction,
        tx_hash: &Hash,
        height: Height,
        applied: &mut AppliedTxs,
    ) -> Result<(Amount, TxFlows), StoreError> {
        let mut flows = TxFlows::default();
        let mut sum_in = Amount::ZERO;
        let mut sum_out = Amount::ZERO;

        {
            let mut utxos = txn.open_table(UTXOS_TABLE)?;
            let mut by_address = txn.open_table(ADDRESS_UTXOS_TABLE)?;

            for input in &tx.inputs {
                let mut spent: UtxoRecord = utxos
                    .get(input.utxo)?
                    .map(|v| from_json(&v.value()))
                    .transpose()?
                    .ok_or(StoreError::MissingUtxo { utxo: input.utxo })?;
                if spent.spent_at.is_some() {
                    return Err(StoreError::SpentUtxo { utxo: input.utxo });
                }

                spent.spent_at = Some(height);
                sum_in = sum_in
                    .checked_add(spent.amount)
                    .ok_or(StoreError::NegativeFee { tx: *tx_hash })?;

                if let Some(owner) = spent.address {
                    by_address.remove((owner, spent.utxo_key))?;
                    flows.debit(owner, spent.amount, spent.tx_type == TxType::Freeze);
                }
                utxos.insert(spent.utxo_key, to_json(&spent)?)?;
            }

            for (output_index, output) in tx.outputs.iter().enumerate() {
                let output_index = output_index as u32;
                let utxo_key = basilica_types::utxo_key(tx_hash, output_index);
                let address = output.address();

                let record = UtxoRecord {
                    utxo_key,
                    tx_hash: *tx_hash,
                    output_index,
                    address,
                    amount: output.amount,
                    tx_type: tx.tx_type,
                    unlock_height: height.increment(),
                    lock: output.lock.clone(),
                    created_at: height,
                    spent_at: None,
                };
                sum_out = sum_out
                    .checked_add(output.amount)
                    .ok_or(StoreError::NegativeFee { tx: *tx_hash })?;

                if let Some(address) = address {
                    by_address.insert((address, utxo_key), ())?;
                    flows.credit(address, output.amount, tx.tx_type == TxType::Freeze);
                }
                utxos.insert(utxo_key, to_json(&record)?)?;
            }
        }

        self.apply_balance_flows(txn, &flows)?;

        // Transactions without inputs mint: the genesis allocation and
        // coinbase rewards. Everyone else pays a non-negative fee.
        let fee = if tx.inputs.is_empty() {
            applied.minted += sum_out;
            Amount::ZERO
        } else {
            let fee = sum_in
                .checked_sub(sum_out)
                .ok_or(StoreError::NegativeFee { tx: *tx_hash })?;
            applied.total_sent += sum_out;
            fee
        };

        applied.frozen_delta += flows.frozen_delta();
        Ok((fee, flows))
    }

    fn apply_balance_flows(
        &self,
        txn: &redb::WriteTransaction,
        flows: &TxFlows,
    ) -> Result<(), StoreError> {
        let mut balances = txn.open_table(BALANCES_TABLE)?;
        for (address, flow) in &flows.by_address {
            let mut balance: BalanceRecord = balances
                .get(address)?
                .map(|v| from_json(&v.value()))
                .transpose()?
                .unwrap_or_default();

            balance.spendable = balance
                .spendable
                .saturating_sub(flow.sent_spendable)
                .checked_add(flow.received_spendable)
                .unwrap_or(balance.spendable);
            balance.frozen = balance
                .frozen
                .saturating_sub(flow.sent_frozen)
                .checked_add(flow.received_frozen)
                .unwrap_or(balance.frozen);

            balances.insert(address, to_json(&balance)?)?;
        }
        Ok(())
    }

    fn record_history(
        &self,
        txn: &redb::WriteTransaction,
        record: &TxRecord,
        flows: &TxFlows,
    ) -> Result<(), StoreError> {
        let mut history = txn.open_table(ADDRESS_HISTORY_TABLE)?;

        let first_sender = flows.first_sender();
        let first_receiver = flows.first_receiver();

        for (address, flow) in &flows.by_address {
            let sent = flow.sent();
            let received = flow.received();

            let (direction, amount, peer) = if sent > Amount::ZERO {
                let direction = if record.tx.payload.is_empty() {
                    HistoryDirection::Outbound
                } else {
                    HistoryDirection::Payload
                };
                let peer = first_receiver.filter(|r| r != address);
                (direction, sent, peer)
            } else {
                let direction = if record.tx.tx_type == TxType::Freeze {
                    HistoryDirection::Freeze
                } else {
                    HistoryDirection::Inbound
                };
                (direction, received, first_sender)
            };

            let row = HistoryRecord {
                tx_hash: record.hash,
                direction,
                peer,
                amount,
                time_stamp: record.time_stamp,
            };
            history.insert((*address, record.height, record.index), to_json(&row)?)?;
        }
        Ok(())
    }

    fn apply_enrollments(
        &self,
        txn: &redb::WriteTransaction,
        block: &Block,
    ) -> Result<(), StoreError> {
        let height = block.header.height;

        for (slot_index, enrollment) in block.header.enrollments.iter().enumerate() {
            let stake: Option<UtxoRecord> = {
                let utxos = txn.open_table(UTXOS_TABLE)?;
                let x = utxos
                    .get(enrollment.utxo_key)?
                    .map(|v| from_json(&v.value()))
                    .transpose()?;
                x
            };

            // The stake must be a live frozen output with a key owner;
            // anything else means the projection and the consensus node
            // disagree, so the enrollment is dropped rather than invented.
            let Some(stake) = stake else {
                tracing::warn!(utxo = %enrollment.utxo_key, %height, "enrollment stake not found, skipping");
                continue;
            };
            let Some(address) = stake.address.filter(|_| {
                stake.tx_type == TxType::Freeze && stake.spent_at.is_none()
            }) else {
                tracing::warn!(utxo = %enrollment.utxo_key, %height, "enrollment stake is not a live frozen key output, skipping");
                continue;
            };

            let cycle_length = if enrollment.cycle_length == 0 {
                self.params.validator_cycle
            } else {
                enrollment.cycle_length
            };

            let record = EnrollmentRecord {
                utxo_key: enrollment.utxo_key,
                address,
                commitment: enrollment.commitment,
                cycle_length,
                enrolled_at: height,
                slot_index: slot_index as u32,
                tip_hash: enrollment.commitment,
                tip_height: height,
            };

            let mut enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            enrollments.insert((enrollment.utxo_key, height), to_json(&record)?)?;
        }
        Ok(())
    }

    /// Applies the header's pre-image reveals to the committee rows.
    fn apply_header_preimages(
        &self,
        txn: &redb::WriteTransaction,
        block: &Block,
        committee: &[EnrollmentRecord],
    ) -> Result<(), StoreError> {
        let height = block.header.height;
        let preimages = &block.header.preimages;

        if preimages.len() != committee.len() {
            return Err(StoreError::PreimageVectorMismatch {
                expected: committee.len(),
                got: preimages.len(),
            });
        }

        let mut enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
        for (member, preimage) in committee.iter().zip(preimages) {
            if preimage.is_zero() || member.tip_height >= height {
                continue;
            }

            let distance = height.as_u64() - member.tip_height.as_u64();
            if derive_preimage(preimage, distance) != member.tip_hash {
                tracing::warn!(
                    validator = %member.address, %height,
                    "header pre-image does not extend the stored chain, skipping"
                );
                continue;
            }

            let mut updated = member.clone();
            updated.tip_hash = *preimage;
            updated.tip_height = height;
            enrollments.insert((updated.utxo_key, updated.enrolled_at), to_json(&updated)?)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Governance application
    // ------------------------------------------------------------------

    fn apply_governance_tx(
        &self,
        txn: &redb::WriteTransaction,
        record: &TxRecord,
        committee: &[EnrollmentRecord],
    ) -> Result<Option<String>, StoreError> {
        match decode_payload(&record.tx.payload) {
            PayloadKind::ProposalFee(fee) => {
                let marker = FeeMarkerRecord {
                    app_name: fee.app_name,
                    proposal_id: fee.proposal_id,
                    tx_hash: record.hash,
                    height: record.height,
                };
                let mut markers = txn.open_table(FEE_MARKERS_TABLE)?;
                markers.insert(record.hash, to_json(&marker)?)?;
                Ok(None)
            }
            PayloadKind::Proposal(payload) => self.apply_proposal(txn, record, payload),
            PayloadKind::Ballot(ballot) => {
                self.apply_ballot(txn, record, &ballot, committee)?;
                Ok(None)
            }
            PayloadKind::Unknown => Ok(None),
        }
    }

    fn apply_proposal(
        &self,
        txn: &redb::WriteTransaction,
        record: &TxRecord,
        payload: ProposalPayload,
    ) -> Result<Option<String>, StoreError> {
        let id = payload.proposal_id.clone();

        if payload.vote_start_height >= payload.vote_end_height {
            tracing::warn!(proposal = %id, "proposal voting window is empty, skipping");
            return Ok(None);
        }

        {
            let proposals = txn.open_table(PROPOSALS_TABLE)?;
            if proposals.get(id.as_str())?.is_some() {
                tracing::warn!(proposal = %id, "proposal already declared, skipping re-declaration");
                return Ok(None);
            }
        }

        let marker: Option<FeeMarkerRecord> = {
            let markers = txn.open_table(FEE_MARKERS_TABLE)?;
            let x = markers
                .get(payload.fee_tx_hash)?
                .map(|v| from_json(&v.value()))
                .transpose()?;
            x
        };
        let marker_ok = marker.is_some_and(|m| {
            m.app_name == payload.app_name && m.proposal_id == payload.proposal_id
        });
        if !marker_ok {
            tracing::warn!(proposal = %id, fee_tx = %payload.fee_tx_hash, "proposal fee marker missing or mismatched, skipping");
            return Ok(None);
        }

        let paid = self.outputs_to(txn, &payload.fee_tx_hash, &payload.fee_destination)?;
        if paid < payload.proposal_fee {
            tracing::warn!(proposal = %id, %paid, required = %payload.proposal_fee, "proposal fee underpaid, skipping");
            return Ok(None);
        }

        let proposal = ProposalRecord {
            status: governance::status_for_height(
                payload.vote_start_height,
                payload.vote_end_height,
                self.params.grace_blocks,
                record.height,
            ),
            result: ProposalResult::Pending,
            payload,
            tx_hash: record.hash,
            created_at: record.height,
            yes_count: 0,
            no_count: 0,
            blank_count: 0,
            reject_count: 0,
            committee_size: 0,
            metadata: None,
        };

        let mut proposals = txn.open_table(PROPOSALS_TABLE)?;
        proposals.insert(id.as_str(), to_json(&proposal)?)?;
        tracing::info!(proposal = %id, height = %record.height, "proposal materialized");
        Ok(Some(id))
    }

    /// Sum of the outputs of the committed transaction `tx_hash` paying
    /// `destination`.
    fn outputs_to(
        &self,
        txn: &redb::WriteTransaction,
        tx_hash: &Hash,
        destination: &Address,
    ) -> Result<Amount, StoreError> {
        let location = {
            let locations = txn.open_table(TX_LOCATIONS_TABLE)?;
            let x = locations.get(tx_hash)?.map(|v| v.value());
            x
        };
        let Some((height, index)) = location else {
            return Ok(Amount::ZERO);
        };

        let transactions = txn.open_table(TRANSACTIONS_TABLE)?;
        let Some(record) = transactions.get((Height::new(height), index))? else {
            return Ok(Amount::ZERO);
        };
        let record: TxRecord = from_json(&record.value())?;

        Ok(record
            .tx
            .outputs
            .iter()
            .filter(|o| o.address().as_ref() == Some(destination))
            .map(|o| o.amount)
            .sum())
    }

    fn apply_ballot(
        &self,
        txn: &redb::WriteTransaction,
        record: &TxRecord,
        ballot: &BallotPayload,
        committee: &[EnrollmentRecord],
    ) -> Result<(), StoreError> {
        let proposal: Option<ProposalRecord> = {
            let proposals = txn.open_table(PROPOSALS_TABLE)?;
            let x = proposals
                .get(ballot.proposal_id.as_str())?
                .map(|v| from_json(&v.value()))
                .transpose()?;
            x
        };

        let claimed = PublicKey::from_sec1_bytes(&ballot.voter_card.validator_key)
            .map(|key| Address::from_public_key(&key))
            .unwrap_or_default();

        let max_accepted_sequence = {
            let ballots = txn.open_table(BALLOTS_TABLE)?;
            let mut max = None;
            let start = BallotLoc {
                proposal_id: ballot.proposal_id.clone(),
                validator: claimed,
                height: Height::GENESIS,
                tx_index: 0,
            };
            let end = BallotLoc {
                proposal_id: ballot.proposal_id.clone(),
                validator: claimed,
                height: Height::new(u64::MAX),
                tx_index: u32::MAX,
            };
            for entry in ballots.range(start..=end)? {
                let (_, value) = entry?;
                let existing: BallotRecord = from_json(&value.value())?;
                if existing.disposition.is_accepted() {
                    max = max.max(Some(existing.sequence));
                }
            }
            max
        };

        let (validator, disposition) = governance::judge_ballot(
            ballot,
            proposal.as_ref(),
            record.height,
            committee,
            max_accepted_sequence,
        );

        if let BallotDisposition::Reject(reason) = disposition {
            tracing::debug!(
                proposal = %ballot.proposal_id, %validator, height = %record.height,
                ?reason, "ballot rejected"
            );
        }

        let row = BallotRecord {
            proposal_id: ballot.proposal_id.clone(),
            validator,
            height: record.height,
            tx_index: record.index,
            tx_hash: record.hash,
            sequence: ballot.sequence,
            encrypted_answer: ballot.encrypted_answer.clone(),
            disposition,
        };

        let loc = BallotLoc {
            proposal_id: row.proposal_id.clone(),
            validator,
            height: row.height,
            tx_index: row.tx_index,
        };
        let mut ballots = txn.open_table(BALLOTS_TABLE)?;
        ballots.insert(loc, to_json(&row)?)?;
        Ok(())
    }

    /// Drives every proposal's status machine for the committed height,
    /// running the deferred tally where it lands.
    fn apply_status_transitions(
        &self,
        txn: &redb::WriteTransaction,
        height: Height,
    ) -> Result<(), StoreError> {
        let proposals: Vec<ProposalRecord> = {
            let table = txn.open_table(PROPOSALS_TABLE)?;
            let mut rows = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                rows.push(from_json(&value.value())?);
            }
            rows
        };

        for mut proposal in proposals {
            if proposal.status == ProposalStatus::Closed {
                continue;
            }

            let target = governance::status_for_height(
                proposal.payload.vote_start_height,
                proposal.payload.vote_end_height,
                self.params.grace_blocks,
                height,
            );
            if target == proposal.status {
                continue;
            }

            if target == ProposalStatus::Closed {
                proposal.status = ProposalStatus::Assessing;
                self.run_tally(txn, &mut proposal)?;
                proposal.status = ProposalStatus::Closed;
            } else {
                proposal.status = target;
            }

            tracing::info!(
                proposal = %proposal.payload.proposal_id, %height,
                status = ?proposal.status, result = ?proposal.result,
                "proposal transition"
            );
            let mut table = txn.open_table(PROPOSALS_TABLE)?;
            table.insert(proposal.payload.proposal_id.as_str(), to_json(&proposal)?)?;
        }
        Ok(())
    }

    fn run_tally(
        &self,
        txn: &redb::WriteTransaction,
        proposal: &mut ProposalRecord,
    ) -> Result<(), StoreError> {
        let id = proposal.payload.proposal_id.clone();
        let vote_start = proposal.payload.vote_start_height;
        let vote_end = proposal.payload.vote_end_height;

        let rows = {
            let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            Self::collect_enrollments(&enrollments)?
        };
        // Quorum denominator: the committee when voting opened. Sealing
        // keys: each voter's pre-image at the close of voting.
        let committee_size = validator_set::committee_at(vote_start, &rows).len() as u64;

        let ballots: Vec<BallotRecord> = {
            let table = txn.open_table(BALLOTS_TABLE)?;
            let mut all = Vec::new();
            for entry in
                table.range(BallotLoc::range_start(&id)..=BallotLoc::range_end(&id))?
            {
                let (_, value) = entry?;
                all.push(from_json(&value.value())?);
            }
            all
        };

        let winners = governance::select_winners(&ballots);
        let app_name = proposal.payload.app_name.clone();
        let outcome = governance::tally(&id, winners, committee_size, |validator| {
            validator_set::chain_covering(&rows, validator, vote_end)
                .and_then(|row| row.preimage_at(vote_end))
                .map(|preimage| hash_multi(&[preimage.as_bytes(), app_name.as_bytes()]))
        });

        {
            let mut table = txn.open_table(BALLOTS_TABLE)?;
            for (ballot, disposition) in &outcome.decoded {
                let mut updated = ballot.clone();
                updated.disposition = *disposition;
                let loc = BallotLoc {
                    proposal_id: updated.proposal_id.clone(),
                    validator: updated.validator,
                    height: updated.height,
                    tx_index: updated.tx_index,
                };
                table.insert(loc, to_json(&updated)?)?;
            }
        }

        proposal.yes_count = outcome.yes;
        proposal.no_count = outcome.no;
        proposal.blank_count = outcome.blank;
        proposal.reject_count =
            outcome.reject + ballots.iter().filter(|b| !b.disposition.is_accepted()).count() as u64;
        proposal.committee_size = committee_size;
        proposal.result = outcome.result;
        Ok(())
    }

    fn bump_stats(
        &self,
        txn: &redb::WriteTransaction,
        height: Height,
        applied: &AppliedTxs,
    ) -> Result<ChainStats, StoreError> {
        let validator_count = {
            let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            let rows = Self::collect_enrollments(&enrollments)?;
            validator_set::enrolled_as_of(height, &rows).len() as u64
        };

        let mut table = txn.open_table(CHAIN_STATS_TABLE)?;

        let bump = |table: &mut redb::Table<'_, &str, u64>,
                    key: &str,
                    delta: i128|
         -> Result<u64, StoreError> {
            let current = table.get(key)?.map(|v| v.value()).unwrap_or(0);
            let next = (current as i128 + delta).max(0) as u64;
            table.insert(key, next)?;
            Ok(next)
        };

        let tx_count = bump(&mut table, STAT_TX_COUNT, applied.txs.len() as i128)?;
        let total_supply = bump(&mut table, STAT_TOTAL_SUPPLY, applied.minted.as_u64() as i128)?;
        let frozen_supply = bump(&mut table, STAT_FROZEN_SUPPLY, applied.frozen_delta)?;

        Ok(ChainStats {
            height,
            tx_count,
            total_supply: Amount::new(total_supply),
            frozen_supply: Amount::new(frozen_supply),
            validator_count,
        })
    }

    // ------------------------------------------------------------------
    // Pre-image and pool intake
    // ------------------------------------------------------------------

    /// Monotone tip advance. Returns whether a row changed; unknown stakes
    /// and non-advancing or out-of-cycle tips are no-ops.
    fn update_preimage(&self, info: &PreImageInfo) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let changed = {
            let mut enrollments = txn.open_table(ENROLLMENTS_TABLE)?;

            let latest: Option<EnrollmentRecord> = {
                let mut found = None;
                let start = (info.utxo, Height::GENESIS);
                let end = (info.utxo, Height::new(u64::MAX));
                for entry in enrollments.range(start..=end)? {
                    let (_, value) = entry?;
                    found = Some(from_json::<EnrollmentRecord>(&value.value())?);
                }
                found
            };

            match latest {
                None => false,
                Some(mut row) => {
                    let within_cycle =
                        info.height.as_u64() < row.enrolled_at.as_u64() + row.cycle_length;
                    let advances = info.height > row.tip_height;
                    let links = advances
                        && derive_preimage(
                            &info.hash,
                            info.height.as_u64() - row.tip_height.as_u64(),
                        ) == row.tip_hash;

                    if within_cycle && links {
                        row.tip_hash = info.hash;
                        row.tip_height = info.height;
                        enrollments.insert((row.utxo_key, row.enrolled_at), to_json(&row)?)?;
                        true
                    } else {
                        false
                    }
                }
            }
        };
        txn.commit()?;
        Ok(changed)
    }

    fn put_transaction_pool(&self, tx: &Transaction) -> Result<bool, StoreError> {
        let hash = tx.hash();
        let txn = self.db.begin_write()?;
        let fresh = {
            // Already committed transactions do not re-enter the pool.
            let locations = txn.open_table(TX_LOCATIONS_TABLE)?;
            let mut pool = txn.open_table(TX_POOL_TABLE)?;
            if locations.get(hash)?.is_some() {
                false
            } else {
                let record = PoolTxRecord {
                    hash,
                    tx: tx.clone(),
                    size: tx.size() as u64,
                };
                pool.insert(hash, to_json(&record)?)?;
                true
            }
        };
        txn.commit()?;
        Ok(fresh)
    }

    fn set_proposal_metadata(
        &self,
        proposal_id: &str,
        metadata: governance::ProposalMetadata,
    ) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let changed = {
            let mut proposals = txn.open_table(PROPOSALS_TABLE)?;
            let existing: Option<ProposalRecord> = proposals
                .get(proposal_id)?
                .map(|v| from_json(&v.value()))
                .transpose()?;
            match existing {
                None => false,
                Some(mut record) => {
                    record.metadata = Some(metadata);
                    proposals.insert(proposal_id, to_json(&record)?)?;
                    true
                }
            }
        };
        txn.commit()?;
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Read queries
    // ------------------------------------------------------------------

    fn get_block(&self, selector: Option<BlockSelector>) -> Result<Option<BlockRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let blocks = txn.open_table(BLOCKS_TABLE)?;

        let height = match selector {
            None => match blocks.last()? {
                Some((key, _)) => Some(key.value()),
                None => None,
            },
            Some(BlockSelector::Height(height)) => Some(height),
            Some(BlockSelector::Hash(hash)) => {
                let hashes = txn.open_table(BLOCK_HASHES_TABLE)?;
                hashes.get(hash)?.map(|v| Height::new(v.value()))
            }
        };

        let Some(height) = height else {
            return Ok(None);
        };
        blocks
            .get(height)?
            .map(|v| from_json(&v.value()))
            .transpose()
    }

    /// Highest block whose wall-clock time is at or before `time_stamp`.
    fn height_at_time(&self, time_stamp: u64) -> Result<Option<Height>, StoreError> {
        let txn = self.db.begin_read()?;
        let blocks = txn.open_table(BLOCKS_TABLE)?;

        let Some((tip, _)) = blocks.last()? else {
            return Ok(None);
        };
        let tip = tip.value().as_u64();

        let time_of = |h: u64| -> Result<u64, StoreError> {
            let record: BlockRecord = blocks
                .get(Height::new(h))?
                .map(|v| from_json(&v.value()))
                .transpose()?
                .expect("heights are dense up to the tip");
            Ok(record.time_stamp)
        };

        if time_of(0)? > time_stamp {
            return Ok(None);
        }

        // Times are monotone in height, so bisect with point reads.
        let (mut lo, mut hi) = (0u64, tip);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if time_of(mid)? <= time_stamp {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Ok(Some(Height::new(lo)))
    }

    fn get_tx(&self, hash: &Hash) -> Result<Option<TxRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let locations = txn.open_table(TX_LOCATIONS_TABLE)?;
        let Some(location) = locations.get(hash)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let transactions = txn.open_table(TRANSACTIONS_TABLE)?;
        transactions
            .get((Height::new(location.0), location.1))?
            .map(|v| from_json(&v.value()))
            .transpose()
    }

    fn get_pool_tx(&self, hash: &Hash) -> Result<Option<PoolTxRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let pool = txn.open_table(TX_POOL_TABLE)?;
        pool.get(hash)?.map(|v| from_json(&v.value())).transpose()
    }

    fn tx_status(&self, hash: &Hash) -> Result<TxStatus, StoreError> {
        let txn = self.db.begin_read()?;

        let locations = txn.open_table(TX_LOCATIONS_TABLE)?;
        if let Some(location) = locations.get(hash)?.map(|v| v.value()) {
            let height = Height::new(location.0);
            let blocks = txn.open_table(BLOCKS_TABLE)?;
            let block: BlockRecord = blocks
                .get(height)?
                .map(|v| from_json(&v.value()))
                .transpose()?
                .expect("committed tx references a committed block");
            return Ok(TxStatus::Confirmed {
                height,
                block_hash: block.hash,
            });
        }

        let pool = txn.open_table(TX_POOL_TABLE)?;
        if pool.get(hash)?.is_some() {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::NotFound)
    }

    /// Unspent outputs owned by `address`.
    fn utxos_of(&self, address: &Address) -> Result<Vec<UtxoRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let by_address = txn.open_table(ADDRESS_UTXOS_TABLE)?;
        let utxos = txn.open_table(UTXOS_TABLE)?;

        let start = (*address, Hash::new([0; Hash::LENGTH]));
        let end = (*address, Hash::new([0xff; Hash::LENGTH]));

        let mut result = Vec::new();
        for entry in by_address.range(start..=end)? {
            let (key, _) = entry?;
            let (_, utxo_key) = key.value();
            if let Some(record) = utxos.get(utxo_key)? {
                result.push(from_json(&record.value())?);
            }
        }
        Ok(result)
    }

    fn utxos_by_keys(&self, keys: &[Hash]) -> Result<Vec<UtxoRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let utxos = txn.open_table(UTXOS_TABLE)?;

        let mut result = Vec::new();
        for key in keys {
            if let Some(record) = utxos.get(key)? {
                result.push(from_json(&record.value())?);
            }
        }
        Ok(result)
    }

    /// Wallet history for `address`, newest first.
    fn wallet_history(
        &self,
        address: &Address,
        filter: &HistoryFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(Height, HistoryRecord)>, StoreError> {
        let txn = self.db.begin_read()?;
        let history = txn.open_table(ADDRESS_HISTORY_TABLE)?;

        let start = (*address, Height::GENESIS, 0u32);
        let end = (*address, Height::new(u64::MAX), u32::MAX);

        let mut matches = Vec::new();
        for entry in history.range(start..=end)?.rev() {
            let (key, value) = entry?;
            let (_, height, _) = key.value();
            let record: HistoryRecord = from_json(&value.value())?;
            if filter.matches(&record) {
                matches.push((height, record));
            }
        }
        Ok(paginate(matches, page, page_size))
    }

    /// Pool entries that touch `address` on either side.
    fn pending_of(&self, address: &Address) -> Result<Vec<PoolTxRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let pool = txn.open_table(TX_POOL_TABLE)?;
        let utxos = txn.open_table(UTXOS_TABLE)?;

        let mut result = Vec::new();
        for entry in pool.iter()? {
            let (_, value) = entry?;
            let record: PoolTxRecord = from_json(&value.value())?;

            let receives = record
                .tx
                .outputs
                .iter()
                .any(|o| o.address().as_ref() == Some(address));
            let mut spends = false;
            for input in &record.tx.inputs {
                let owner: Option<Address> = utxos
                    .get(input.utxo)?
                    .map(|v| from_json::<UtxoRecord>(&v.value()))
                    .transpose()?
                    .and_then(|u| u.address);
                if owner.as_ref() == Some(address) {
                    spends = true;
                    break;
                }
            }

            if receives || spends {
                result.push(record);
            }
        }
        Ok(result)
    }

    fn latest_blocks(&self, page: u64, page_size: u64) -> Result<Paged<BlockRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let blocks = txn.open_table(BLOCKS_TABLE)?;

        let total = blocks.len()?;
        let mut items = Vec::new();
        let skip = (page - 1).saturating_mul(page_size) as usize;
        for entry in blocks.iter()?.rev().skip(skip).take(page_size as usize) {
            let (_, value) = entry?;
            items.push(from_json(&value.value())?);
        }
        Ok(Paged { items, total })
    }

    fn latest_txs(&self, page: u64, page_size: u64) -> Result<Paged<TxRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let transactions = txn.open_table(TRANSACTIONS_TABLE)?;

        let total = transactions.len()?;
        let mut items = Vec::new();
        let skip = (page - 1).saturating_mul(page_size) as usize;
        for entry in transactions.iter()?.rev().skip(skip).take(page_size as usize) {
            let (_, value) = entry?;
            items.push(from_json(&value.value())?);
        }
        Ok(Paged { items, total })
    }

    fn block_enrollments(
        &self,
        selector: BlockSelector,
        page: u64,
        page_size: u64,
    ) -> Result<Option<Paged<EnrollmentRecord>>, StoreError> {
        let Some(block) = self.get_block(Some(selector))? else {
            return Ok(None);
        };

        let txn = self.db.begin_read()?;
        let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;

        let mut rows = Vec::new();
        for enrollment in &block.header.enrollments {
            if let Some(value) = enrollments.get((enrollment.utxo_key, block.height()))? {
                rows.push(from_json(&value.value())?);
            }
        }
        Ok(Some(paginate(rows, page, page_size)))
    }

    fn block_txs(
        &self,
        selector: BlockSelector,
        page: u64,
        page_size: u64,
    ) -> Result<Option<Paged<TxRecord>>, StoreError> {
        let Some(block) = self.get_block(Some(selector))? else {
            return Ok(None);
        };
        let height = block.height();

        let txn = self.db.begin_read()?;
        let transactions = txn.open_table(TRANSACTIONS_TABLE)?;

        let total = block.tx_hashes.len() as u64;
        let skip = (page - 1).saturating_mul(page_size) as usize;
        let mut items = Vec::new();
        for entry in transactions
            .range((height, 0u32)..=(height, u32::MAX))?
            .skip(skip)
            .take(page_size as usize)
        {
            let (_, value) = entry?;
            items.push(from_json(&value.value())?);
        }
        Ok(Some(Paged { items, total }))
    }

    /// Validators as of ledger height `height` (default: the tip).
    /// `None` when the requested height is past the tip.
    fn validators_at(&self, height: Option<Height>) -> Result<Option<Vec<ValidatorView>>, StoreError> {
        let txn = self.db.begin_read()?;

        let tip = {
            let blocks = txn.open_table(BLOCKS_TABLE)?;
            let x = match blocks.last()? {
                Some((key, _)) => key.value(),
                None => return Ok(None),
            };
            x
        };
        let height = height.unwrap_or(tip);
        if height > tip {
            return Ok(None);
        }

        let rows = {
            let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            Self::collect_enrollments(&enrollments)?
        };
        let utxos = txn.open_table(UTXOS_TABLE)?;

        let mut views = Vec::new();
        for member in validator_set::enrolled_as_of(height, &rows) {
            let stake: Option<UtxoRecord> = utxos
                .get(member.utxo_key)?
                .map(|v| from_json(&v.value()))
                .transpose()?;
            views.push(ValidatorView {
                address: member.address,
                utxo_key: member.utxo_key,
                stake: stake.map(|u| u.amount).unwrap_or(Amount::ZERO),
                enrolled_at: member.enrolled_at,
                cycle_length: member.cycle_length,
                preimage_hash: member.tip_hash,
                preimage_height: member.tip_height,
            });
        }
        Ok(Some(views))
    }

    fn chain_stats(&self) -> Result<ChainStats, StoreError> {
        let txn = self.db.begin_read()?;

        let height = {
            let blocks = txn.open_table(BLOCKS_TABLE)?;
            let x = blocks
                .last()?
                .map(|(key, _)| key.value())
                .unwrap_or(Height::GENESIS);
            x
        };

        let stats = txn.open_table(CHAIN_STATS_TABLE)?;
        let read = |key: &str| -> Result<u64, StoreError> {
            Ok(stats.get(key)?.map(|v| v.value()).unwrap_or(0))
        };

        let validator_count = {
            let enrollments = txn.open_table(ENROLLMENTS_TABLE)?;
            let rows = Self::collect_enrollments(&enrollments)?;
            validator_set::enrolled_as_of(height, &rows).len() as u64
        };

        Ok(ChainStats {
            height,
            tx_count: read(STAT_TX_COUNT)?,
            total_supply: Amount::new(read(STAT_TOTAL_SUPPLY)?),
            frozen_supply: Amount::new(read(STAT_FROZEN_SUPPLY)?),
            validator_count,
        })
    }

    /// Balances ranked by total holding, largest first.
    fn holders(&self, page: u64, page_size: u64) -> Result<Paged<(Address, BalanceRecord)>, StoreError> {
        let txn = self.db.begin_read()?;
        let balances = txn.open_table(BALANCES_TABLE)?;

        let mut rows: Vec<(Address, BalanceRecord)> = Vec::new();
        for entry in balances.iter()? {
            let (key, value) = entry?;
            let balance: BalanceRecord = from_json(&value.value())?;
            if balance.total() > Amount::ZERO {
                rows.push((key.value(), balance));
            }
        }
        rows.sort_by(|a, b| b.1.total().cmp(&a.1.total()).then(a.0.cmp(&b.0)));
        Ok(paginate(rows, page, page_size))
    }

    fn proposals(&self, page: u64, page_size: u64) -> Result<Paged<ProposalRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROPOSALS_TABLE)?;

        let mut rows: Vec<ProposalRecord> = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            rows.push(from_json(&value.value())?);
        }
        // Latest declarations first.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page, page_size))
    }

    fn proposal(&self, id: &str) -> Result<Option<(ProposalRecord, Vec<BallotRecord>)>, StoreError> {
        let txn = self.db.begin_read()?;
        let proposals = txn.open_table(PROPOSALS_TABLE)?;

        let Some(record) = proposals.get(id)?.map(|v| from_json(&v.value())).transpose()? else {
            return Ok(None);
        };

        let ballots_table = txn.open_table(BALLOTS_TABLE)?;
        let mut ballots = Vec::new();
        for entry in ballots_table.range(BallotLoc::range_start(id)..=BallotLoc::range_end(id))? {
            let (_, value) = entry?;
            ballots.push(from_json(&value.value())?);
        }
        Ok(Some((record, ballots)))
    }
}

/// Per-transaction flow bookkeeping shared by balances and history.
#[derive(Default)]
struct TxFlows {
    by_address: BTreeMap<Address, AddressFlow>,
    input_order: Vec<Address>,
    output_order: Vec<Address>,
}

#[derive(Default)]
struct AddressFlow {
    sent_spendable: Amount,
    sent_frozen: Amount,
    received_spendable: Amount,
    received_frozen: Amount,
}

impl AddressFlow {
    fn sent(&self) -> Amount {
        self.sent_spendable + self.sent_frozen
    }

    fn received(&self) -> Amount {
        self.received_spendable + self.received_frozen
    }
}

impl TxFlows {
    fn debit(&mut self, address: Address, amount: Amount, frozen: bool) {
        let flow = self.by_address.entry(address).or_default();
        if frozen {
            flow.sent_frozen += amount;
        } else {
            flow.sent_spendable += amount;
        }
        if !self.input_order.contains(&address) {
            self.input_order.push(address);
        }
    }

    fn credit(&mut self, address: Address, amount: Amount, frozen: bool) {
        let flow = self.by_address.entry(address).or_default();
        if frozen {
            flow.received_frozen += amount;
        } else {
            flow.received_spendable += amount;
        }
        if !self.output_order.contains(&address) {
            self.output_order.push(address);
        }
    }

    fn first_sender(&self) -> Option<Address> {
        self.input_order.first().copied()
    }

    fn first_receiver(&self) -> Option<Address> {
        self.output_order.first().copied()
    }

    fn frozen_delta(&self) -> i128 {
        self.by_address
            .values()
            .map(|f| f.received_frozen.as_u64() as i128 - f.sent_frozen.as_u64() as i128)
            .sum()
    }
}

/// Accumulated effects of a block's transactions.
#[derive(Default)]
struct AppliedTxs {
    txs: Vec<TxRecord>,
    created_proposals: Vec<String>,
    total_sent: Amount,
    total_fees: Amount,
    minted: Amount,
    frozen_delta: i128,
}

#[derive(Clone)]
pub struct Store {
    db: Arc<Db>,
}

impl Store {
    /// Opens the store at `path`. Called once at boot; failure here is
    /// fatal.
    pub async fn open(path: impl AsRef<Path>, params: LedgerParams) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();

        tokio::task::spawn_blocking(move || {
            let db = Db::new(path, params)?;
            db.create_tables()?;
            Ok(Self { db: Arc::new(db) })
        })
        .await?
    }

    /// One past the highest committed height; 0 on an empty store.
    pub async fn expected_next_height(&self) -> Result<Height, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.expected_next_height()).await?
    }

    /// Commits a block and everything it implies, atomically.
    pub async fn put_block(&self, block: Block) -> Result<CommittedBlock, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.put_block(&block)).await?
    }

    /// Applies a pre-image advance; returns whether a row changed.
    pub async fn update_preimage(&self, info: PreImageInfo) -> Result<bool, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.update_preimage(&info)).await?
    }

    /// Records a mempool entry, best-effort.
    pub async fn put_transaction_pool(&self, tx: Transaction) -> Result<bool, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.put_transaction_pool(&tx)).await?
    }

    pub async fn set_proposal_metadata(
        &self,
        proposal_id: String,
        metadata: governance::ProposalMetadata,
    ) -> Result<bool, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.set_proposal_metadata(&proposal_id, metadata))
            .await?
    }

    pub async fn get_block(
        &self,
        selector: Option<BlockSelector>,
    ) -> Result<Option<BlockRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.get_block(selector)).await?
    }

    pub async fn height_at_time(&self, time_stamp: u64) -> Result<Option<Height>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.height_at_time(time_stamp)).await?
    }

    pub async fn get_tx(&self, hash: Hash) -> Result<Option<TxRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.get_tx(&hash)).await?
    }

    pub async fn get_pool_tx(&self, hash: Hash) -> Result<Option<PoolTxRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.get_pool_tx(&hash)).await?
    }

    pub async fn tx_status(&self, hash: Hash) -> Result<TxStatus, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.tx_status(&hash)).await?
    }

    pub async fn utxos_of(&self, address: Address) -> Result<Vec<UtxoRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.utxos_of(&address)).await?
    }

    pub async fn utxos_by_keys(&self, keys: Vec<Hash>) -> Result<Vec<UtxoRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.utxos_by_keys(&keys)).await?
    }

    pub async fn wallet_history(
        &self,
        address: Address,
        filter: HistoryFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(Height, HistoryRecord)>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.wallet_history(&address, &filter, page, page_size))
            .await?
    }

    pub async fn pending_of(&self, address: Address) -> Result<Vec<PoolTxRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.pending_of(&address)).await?
    }

    pub async fn latest_blocks(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<BlockRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.latest_blocks(page, page_size)).await?
    }

    pub async fn latest_txs(&self, page: u64, page_size: u64) -> Result<Paged<TxRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.latest_txs(page, page_size)).await?
    }

    pub async fn block_enrollments(
        &self,
        selector: BlockSelector,
        page: u64,
        page_size: u64,
    ) -> Result<Option<Paged<EnrollmentRecord>>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.block_enrollments(selector, page, page_size)).await?
    }

    pub async fn block_txs(
        &self,
        selector: BlockSelector,
        page: u64,
        page_size: u64,
    ) -> Result<Option<Paged<TxRecord>>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.block_txs(selector, page, page_size)).await?
    }

    pub async fn validators_at(
        &self,
        height: Option<Height>,
    ) -> Result<Option<Vec<ValidatorView>>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.validators_at(height)).await?
    }

    pub async fn chain_stats(&self) -> Result<ChainStats, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.chain_stats()).await?
    }

    pub async fn holders(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(Address, BalanceRecord)>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.holders(page, page_size)).await?
    }

    pub async fn proposals(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<ProposalRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.proposals(page, page_size)).await?
    }

    pub async fn proposal(
        &self,
        id: String,
    ) -> Result<Option<(ProposalRecord, Vec<BallotRecord>)>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.proposal(&id)).await?
    }
}
