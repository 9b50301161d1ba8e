//! Shared harness for the end-to-end scenarios: a chain builder that
//! produces structurally valid blocks (linked headers, merkle roots,
//! committee-ordered pre-image vectors) and a scripted consensus node.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use basilica::events::EventBus;
use basilica::ingest::{self, IngestTask, IngestWorker};
use basilica::store::{LedgerParams, Store};
use basilica_agora::ConsensusReader;
use basilica_types::crypto::{encrypt_key_derive, seal_answer, VoteChoice};
use basilica_types::payload::{BallotPayload, ProposalFeePayload, ProposalPayload, ProposalType, VoterCard};
use basilica_types::preimage::hash_chain;
use basilica_types::{
    hash, hash_multi, merkle_path, merkle_root, utxo_key, Address, Amount, Block, BlockHeader,
    Enrollment, Hash, Height, PrivateKey, RawSignature, Transaction, TxOutput, TxType,
};
use color_eyre::eyre::{self, eyre};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const CYCLE: u64 = 20;
pub const GENESIS_TS: u64 = 1_600_000_000;
pub const INTERVAL: u64 = 600;
pub const STAKE: u64 = 40_000;

pub fn test_params() -> LedgerParams {
    LedgerParams {
        genesis_timestamp: GENESIS_TS,
        block_interval: INTERVAL,
        validator_cycle: CYCLE,
        governance_enabled: true,
        grace_blocks: 7,
    }
}

pub async fn open_store(dir: &tempfile::TempDir) -> Store {
    Store::open(dir.path().join("test.redb"), test_params())
        .await
        .unwrap()
}

pub struct TestValidator {
    pub key: PrivateKey,
    pub address: Address,
    pub stake_utxo: Hash,
    /// Enrollment history: `(anchor, chain)` with `chain[k]` the reveal
    /// for height `anchor + k`.
    pub enrollments: Vec<(u64, Vec<Hash>)>,
}

impl TestValidator {
    /// Enrollment window covering `height`, if any.
    fn active_enrollment(&self, height: u64) -> Option<&(u64, Vec<Hash>)> {
        self.enrollments
            .iter()
            .filter(|(anchor, _)| *anchor < height)
            .max_by_key(|(anchor, _)| *anchor)
            .filter(|(anchor, _)| height <= anchor + CYCLE)
    }

    pub fn is_active(&self, height: u64) -> bool {
        self.active_enrollment(height).is_some()
    }

    /// The reveal this validator publishes for `height`.
    pub fn preimage_for(&self, height: u64) -> Option<Hash> {
        let (anchor, chain) = self.active_enrollment(height)?;
        chain.get((height - anchor) as usize).copied()
    }

    /// Pre-image used for ballot sealing: from the chain covering
    /// `height`, including a chain anchored exactly there.
    pub fn sealing_preimage(&self, height: u64) -> Hash {
        let (anchor, chain) = self
            .enrollments
            .iter()
            .filter(|(anchor, _)| *anchor <= height)
            .max_by_key(|(anchor, _)| *anchor)
            .expect("no enrollment covers this height");
        chain[(height - anchor) as usize]
    }
}

pub struct ChainBuilder {
    pub blocks: Vec<Block>,
    pub validators: Vec<TestValidator>,
    rng: StdRng,
    next_seed: u64,
}

impl ChainBuilder {
    /// Genesis block with `count` frozen stakes and enrollments.
    pub fn with_genesis(count: usize) -> Self {
        let mut builder = Self {
            blocks: Vec::new(),
            validators: Vec::new(),
            rng: StdRng::seed_from_u64(0x600d_5eed),
            next_seed: 0,
        };

        let (txs, enrollments) = builder.make_stakes(count, 0);
        let genesis = assemble_block(Hash::ZERO, 0, txs, enrollments, vec![]);
        builder.blocks.push(genesis);
        builder
    }

    fn make_stakes(&mut self, count: usize, anchor: u64) -> (Vec<Transaction>, Vec<Enrollment>) {
        let mut txs = Vec::new();
        let mut enrollments = Vec::new();

        for _ in 0..count {
            let key = PrivateKey::generate(&mut self.rng);
            let address = Address::from_public_key(&key.public_key());

            let freeze = Transaction::new(
                TxType::Freeze,
                vec![],
                vec![TxOutput::to_address(Amount::new(STAKE), address)],
            );
            let stake_utxo = utxo_key(&freeze.hash(), 0);

            let seed = hash(&self.next_seed.to_le_bytes());
            self.next_seed += 1;
            let chain = hash_chain(seed, CYCLE);

            enrollments.push(Enrollment {
                utxo_key: stake_utxo,
                commitment: chain[0],
                cycle_length: CYCLE,
                enroll_sig: RawSignature::ZERO,
            });
            self.validators.push(TestValidator {
                key,
                address,
                stake_utxo,
                enrollments: vec![(anchor, chain)],
            });
            txs.push(freeze);
        }
        (txs, enrollments)
    }

    pub fn tip_hash(&self) -> Hash {
        self.blocks.last().expect("builder always has genesis").hash()
    }

    pub fn next_height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Committee working on `height`, canonical order, mirroring the
    /// engine's definition.
    fn committee_at(&self, height: u64) -> Vec<&TestValidator> {
        let mut members: Vec<&TestValidator> = self
            .validators
            .iter()
            .filter(|v| v.is_active(height))
            .collect();
        members.sort_by_key(|v| v.address);
        members
    }

    pub fn push_block(&mut self, txs: Vec<Transaction>) -> Block {
        self.push_block_with(txs, vec![])
    }

    pub fn push_block_with(
        &mut self,
        txs: Vec<Transaction>,
        enrollments: Vec<Enrollment>,
    ) -> Block {
        let height = self.next_height();
        let preimages = self
            .committee_at(height)
            .iter()
            .map(|v| v.preimage_for(height).unwrap_or(Hash::ZERO))
            .collect();
        let block = assemble_block(self.tip_hash(), height, txs, enrollments, preimages);
        self.blocks.push(block.clone());
        block
    }

    /// Freeze-then-enroll `count` new validators in the next block.
    pub fn push_block_enrolling(&mut self, count: usize) -> Block {
        let anchor = self.next_height();
        let (txs, enrollments) = self.make_stakes(count, anchor);
        self.push_block_with(txs, enrollments)
    }

    /// Renews validator `index`'s enrollment in the next block, reusing
    /// its frozen stake with a fresh pre-image chain.
    pub fn push_block_renewing(&mut self, index: usize) -> Block {
        let anchor = self.next_height();
        let seed = hash(&self.next_seed.to_le_bytes());
        self.next_seed += 1;
        let chain = hash_chain(seed, CYCLE);

        let enrollment = Enrollment {
            utxo_key: self.validators[index].stake_utxo,
            commitment: chain[0],
            cycle_length: CYCLE,
            enroll_sig: RawSignature::ZERO,
        };
        self.validators[index].enrollments.push((anchor, chain));
        self.push_block_with(vec![], vec![enrollment])
    }

    /// Empty blocks up to and including `height`.
    pub fn push_until(&mut self, height: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        while self.next_height() <= height {
            blocks.push(self.push_block(vec![]));
        }
        blocks
    }

    /// Commits every block built so far into `store`.
    pub async fn commit_all(&self, store: &Store) {
        let from = store.expected_next_height().await.unwrap().as_u64();
        for block in &self.blocks[from as usize..] {
            store.put_block(block.clone()).await.unwrap();
        }
    }

    // ------------------------------------------------------------------
    // Governance transactions
    // ------------------------------------------------------------------

    pub fn fee_tx(&self, app_name: &str, proposal_id: &str, destination: Address, amount: u64) -> Transaction {
        let payload = ProposalFeePayload {
            app_name: app_name.into(),
            proposal_id: proposal_id.into(),
        };
        Transaction::new(
            TxType::Payment,
            vec![],
            vec![TxOutput::to_address(Amount::new(amount), destination)],
        )
        .with_payload(payload.encode())
    }

    pub fn proposal_tx(&self, payload: &ProposalPayload) -> Transaction {
        Transaction::new(
            TxType::Payment,
            vec![],
            vec![TxOutput::to_address(
                Amount::new(1),
                payload.proposer_address,
            )],
        )
        .with_payload(payload.encode())
    }

    /// A sealed, doubly signed ballot from validator `index`.
    pub fn ballot_tx(
        &mut self,
        index: usize,
        payload_of: &ProposalPayload,
        choice: VoteChoice,
        sequence: u32,
    ) -> Transaction {
        let validator = &self.validators[index];
        let vote_end = payload_of.vote_end_height.as_u64();

        let first = hash_multi(&[
            validator.sealing_preimage(vote_end).as_bytes(),
            payload_of.app_name.as_bytes(),
        ]);
        let key = encrypt_key_derive(&first, &payload_of.proposal_id);
        let nonce = [sequence as u8 ^ index as u8; 8];
        let sealed = seal_answer(&key, choice, &nonce);

        let temporary = PrivateKey::generate(&mut self.rng);
        let mut ballot = BallotPayload {
            app_name: payload_of.app_name.clone(),
            proposal_id: payload_of.proposal_id.clone(),
            encrypted_answer: sealed,
            voter_card: VoterCard {
                validator_key: validator.key.public_key().to_sec1_bytes().to_vec(),
                temporary_key: temporary.public_key().to_sec1_bytes().to_vec(),
                expires: "2026-12-31T00:00:00Z".into(),
                signature: RawSignature::ZERO,
            },
            sequence,
            signature: RawSignature::ZERO,
        };
        ballot.voter_card.signature = validator.key.sign(&ballot.voter_card.digest()).into();
        ballot.signature = temporary.sign(&ballot.digest()).into();

        Transaction::new(
            TxType::Payment,
            vec![],
            vec![TxOutput::to_address(Amount::new(100), validator.address)],
        )
        .with_payload(ballot.encode())
    }
}

pub fn assemble_block(
    prev: Hash,
    height: u64,
    txs: Vec<Transaction>,
    enrollments: Vec<Enrollment>,
    preimages: Vec<Hash>,
) -> Block {
    let tx_hashes: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    Block {
        header: BlockHeader {
            prev_block: prev,
            height: Height::new(height),
            merkle_root: merkle_root(&tx_hashes),
            random_seed: hash(&height.to_le_bytes()),
            signature: RawSignature::ZERO,
            enrollments,
            preimages,
            time_offset: 0,
        },
        txs,
    }
}

pub fn sample_proposal_payload(fee_tx: &Transaction, destination: Address) -> ProposalPayload {
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
        fee_tx_hash: fee_tx.hash(),
        proposer_address: Address::new([3; 20]),
        fee_destination: destination,
    }
}

/// Scripted consensus node serving a fixed chain.
pub struct MockConsensus {
    pub blocks: Vec<Block>,
}

#[async_trait]
impl ConsensusReader for MockConsensus {
    async fn get_tip_height(&self) -> eyre::Result<Height> {
        self.blocks
            .last()
            .map(|b| b.header.height)
            .ok_or_else(|| eyre!("mock ledger is empty"))
    }

    async fn get_blocks_from(&self, start: Height, count: u64) -> eyre::Result<Vec<Block>> {
        Ok(self
            .blocks
            .iter()
            .filter(|b| {
                b.header.height >= start && b.header.height.as_u64() < start.as_u64() + count
            })
            .cloned()
            .collect())
    }

    async fn get_merkle_path(&self, height: Height, tx_hash: &Hash) -> eyre::Result<Vec<Hash>> {
        let block = self
            .blocks
            .iter()
            .find(|b| b.header.height == height)
            .ok_or_else(|| eyre!("no block at height {height}"))?;
        let hashes = block.tx_hashes();
        let index = hashes
            .iter()
            .position(|h| h == tx_hash)
            .ok_or_else(|| eyre!("tx not in block"))?;
        Ok(merkle_path(&hashes, index))
    }
}

/// Runs the ingest worker over `tasks` until the queue drains.
pub async fn run_worker(store: &Store, consensus: Arc<MockConsensus>, tasks: Vec<IngestTask>) {
    let (handle, receiver) = ingest::channel(1024, 512);
    let events = Arc::new(EventBus::new());
    let worker = IngestWorker::new(store.clone(), consensus, events, None, receiver);

    for task in tasks {
        handle.submit(task);
    }
    drop(handle);
    worker.run().await;
}
