//! Public read endpoints. Each handler validates its parameters, runs one
//! store query, and shapes the row into a response DTO. Amounts serialize
//! as decimal strings throughout.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use basilica_types::{
    fold_merkle_path, Address, Amount, Hash, Height, LockType, Transaction, TxType,
};
use serde::{Deserialize, Serialize};

use super::params::{self, Pagination};
use super::{ApiContext, ApiError};
use crate::governance::{BallotDisposition, ProposalMetadata, ProposalResult, ProposalStatus};
use crate::store::records::{
    BlockRecord, EnrollmentRecord, HistoryDirection, HistoryRecord, PoolTxRecord, TxRecord,
    UtxoRecord,
};
use crate::store::{BlockSelector, HistoryFilter, Paged, TxStatus};

/// Fee rate per byte of transaction size; the bands give wallets a
/// low/medium/high choice.
const FEE_RATE: u64 = 200;

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/block_height", get(block_height))
        .route("/block_height_at/:time", get(block_height_at))
        .route("/validators", get(validators))
        .route("/validator/:address", get(validator))
        .route("/transaction/:hash", get(transaction))
        .route("/transaction/pending/:hash", get(transaction_pending))
        .route("/transaction/status/:hash", get(transaction_status))
        .route("/transaction/fees/:tx_size", get(transaction_fees))
        .route("/utxo/:address", get(utxos_of_address))
        .route("/utxos", post(utxos_by_keys))
        .route("/wallet/transactions/history/:address", get(wallet_history))
        .route("/wallet/transaction/overview/:hash", get(wallet_overview))
        .route("/wallet/transactions/pending/:address", get(wallet_pending))
        .route("/wallet/blocks/header", get(wallet_block_header))
        .route("/latest-blocks", get(latest_blocks))
        .route("/latest-transactions", get(latest_transactions))
        .route("/block-summary", get(block_summary))
        .route("/block-enrollments", get(block_enrollments))
        .route("/block-transactions", get(block_transactions))
        .route("/boa-stats", get(boa_stats))
        .route("/holders", get(holders))
        .route("/spv/:hash", get(spv))
        .route("/proposals", get(proposals))
        .route("/proposal/:proposal_id", get(proposal))
        .with_state(context)
}

/// Resolves the `height=` / `hash=` selector pair used by the block
/// endpoints; exactly one must be present.
fn block_selector(query: &HashMap<String, String>) -> Result<BlockSelector, ApiError> {
    match (query.get("height"), query.get("hash")) {
        (Some(h), None) => Ok(BlockSelector::Height(params::height(h)?)),
        (None, Some(h)) => Ok(BlockSelector::Hash(params::hash(h)?)),
        _ => Err(ApiError::invalid("exactly one of height or hash is required")),
    }
}

// ----------------------------------------------------------------------
// Chain basics
// ----------------------------------------------------------------------

async fn block_height(State(ctx): State<ApiContext>) -> Result<Json<Height>, ApiError> {
    let block = ctx
        .store
        .get_block(None)
        .await?
        .ok_or_else(|| ApiError::not_found("no blocks committed yet"))?;
    Ok(Json(block.height()))
}

async fn block_height_at(
    State(ctx): State<ApiContext>,
    Path(time): Path<String>,
) -> Result<Json<Height>, ApiError> {
    let time = params::timestamp(&time)?;
    let height = ctx
        .store
        .height_at_time(time)
        .await?
        .ok_or_else(|| ApiError::not_found("no block at or before that time"))?;
    Ok(Json(height))
}

async fn validators(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<crate::store::records::ValidatorView>>, ApiError> {
    let height = params::opt_height(&query)?;
    let views = ctx
        .store
        .validators_at(height)
        .await?
        .ok_or_else(|| ApiError::invalid("height is beyond the current tip"))?;
    if views.is_empty() {
        return Err(ApiError::not_found("no active validators"));
    }
    Ok(Json(views))
}

async fn validator(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<crate::store::records::ValidatorView>, ApiError> {
    let address = params::address(&address)?;
    let height = params::opt_height(&query)?;
    let views = ctx
        .store
        .validators_at(height)
        .await?
        .ok_or_else(|| ApiError::invalid("height is beyond the current tip"))?;
    views
        .into_iter()
        .find(|v| v.address == address)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("address is not an active validator"))
}

// ----------------------------------------------------------------------
// Transactions
// ----------------------------------------------------------------------

async fn transaction(
    State(ctx): State<ApiContext>,
    Path(hash): Path<String>,
) -> Result<Json<TxRecord>, ApiError> {
    let hash = params::hash(&hash)?;
    ctx.store
        .get_tx(hash)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("transaction not found"))
}

async fn transaction_pending(
    State(ctx): State<ApiContext>,
    Path(hash): Path<String>,
) -> Result<Json<PoolTxRecord>, ApiError> {
    let hash = params::hash(&hash)?;
    ctx.store
        .get_pool_tx(hash)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("transaction is not pending"))
}

#[derive(Serialize)]
struct TxStatusDto {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<Height>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_hash: Option<Hash>,
}

async fn transaction_status(
    State(ctx): State<ApiContext>,
    Path(hash): Path<String>,
) -> Result<Json<TxStatusDto>, ApiError> {
    let hash = params::hash(&hash)?;
    match ctx.store.tx_status(hash).await? {
        TxStatus::Confirmed { height, block_hash } => Ok(Json(TxStatusDto {
            status: "confirmed",
            height: Some(height),
            block_hash: Some(block_hash),
        })),
        TxStatus::Pending => Ok(Json(TxStatusDto {
            status: "pending",
            height: None,
            block_hash: None,
        })),
        TxStatus::NotFound => Err(ApiError::not_found("transaction not found")),
    }
}

#[derive(Serialize)]
struct FeesDto {
    tx_size: u64,
    low: Amount,
    medium: Amount,
    high: Amount,
}

async fn transaction_fees(Path(tx_size): Path<String>) -> Result<Json<FeesDto>, ApiError> {
    if tx_size.is_empty() || !tx_size.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::invalid(format!("invalid tx size: {tx_size:?}")));
    }
    let size: u64 = tx_size
        .parse()
        .map_err(|_| ApiError::invalid(format!("invalid tx size: {tx_size:?}")))?;
    if size == 0 {
        return Err(ApiError::invalid("tx size must be positive"));
    }

    Ok(Json(FeesDto {
        tx_size: size,
        low: Amount::new(size * (FEE_RATE * 9 / 10)),
        medium: Amount::new(size * FEE_RATE),
        high: Amount::new(size * (FEE_RATE * 11 / 10)),
    }))
}

// ----------------------------------------------------------------------
// UTXOs
// ----------------------------------------------------------------------

#[derive(Serialize)]
struct UtxoDto {
    utxo: Hash,
    #[serde(rename = "type")]
    tx_type: TxType,
    amount: Amount,
    height: Height,
    unlock_height: Height,
    lock_type: LockType,
    lock_bytes: String,
}

impl From<UtxoRecord> for UtxoDto {
    fn from(record: UtxoRecord) -> Self {
        Self {
            utxo: record.utxo_key,
            tx_type: record.tx_type,
            amount: record.amount,
            height: record.created_at,
            unlock_height: record.unlock_height,
            lock_type: record.lock.lock_type,
            lock_bytes: hex::encode(&record.lock.bytes),
        }
    }
}

async fn utxos_of_address(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<Vec<UtxoDto>>, ApiError> {
    let address = params::address(&address)?;
    let utxos = ctx.store.utxos_of(address).await?;
    Ok(Json(utxos.into_iter().map(UtxoDto::from).collect()))
}

#[derive(Deserialize)]
struct UtxoQuery {
    utxos: Vec<String>,
}

async fn utxos_by_keys(
    State(ctx): State<ApiContext>,
    Json(body): Json<UtxoQuery>,
) -> Result<Json<Vec<UtxoDto>>, ApiError> {
    let keys = body
        .utxos
        .iter()
        .map(|raw| params::hash(raw))
        .collect::<Result<Vec<Hash>, ApiError>>()?;
    let utxos = ctx.store.utxos_by_keys(keys).await?;
    Ok(Json(utxos.into_iter().map(UtxoDto::from).collect()))
}

// ----------------------------------------------------------------------
// Wallet
// ----------------------------------------------------------------------

fn history_direction(raw: &str) -> Result<HistoryDirection, ApiError> {
    match raw {
        "inbound" => Ok(HistoryDirection::Inbound),
        "outbound" => Ok(HistoryDirection::Outbound),
        "freeze" => Ok(HistoryDirection::Freeze),
        "payload" => Ok(HistoryDirection::Payload),
        other => Err(ApiError::invalid(format!("invalid history type: {other:?}"))),
    }
}

#[derive(Serialize)]
struct HistoryItemDto {
    height: Height,
    tx_hash: Hash,
    #[serde(rename = "type")]
    direction: HistoryDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<Address>,
    amount: Amount,
    time_stamp: u64,
}

#[derive(Serialize)]
struct PagedDto<T> {
    items: Vec<T>,
    total: u64,
}

impl<T, U: From<T>> From<Paged<T>> for PagedDto<U> {
    fn from(paged: Paged<T>) -> Self {
        Self {
            items: paged.items.into_iter().map(U::from).collect(),
            total: paged.total,
        }
    }
}

impl From<(Height, HistoryRecord)> for HistoryItemDto {
    fn from((height, record): (Height, HistoryRecord)) -> Self {
        Self {
            height,
            tx_hash: record.tx_hash,
            direction: record.direction,
            peer: record.peer,
            amount: record.amount,
            time_stamp: record.time_stamp,
        }
    }
}

async fn wallet_history(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<HistoryItemDto>>, ApiError> {
    let address = params::address(&address)?;
    let Pagination { page, page_size } = params::pagination(&query)?;

    let filter = HistoryFilter {
        direction: query
            .get("type")
            .map(|raw| history_direction(raw))
            .transpose()?,
        begin: query
            .get("beginDate")
            .map(|raw| params::timestamp(raw))
            .transpose()?,
        end: query
            .get("endDate")
            .map(|raw| params::timestamp(raw))
            .transpose()?,
        peer: query
            .get("peer")
            .map(|raw| params::address(raw))
            .transpose()?,
    };

    let paged = ctx
        .store
        .wallet_history(address, filter, page, page_size)
        .await?;
    Ok(Json(paged.into()))
}

#[derive(Serialize)]
struct OverviewSideDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
    amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    utxo: Option<Hash>,
}

#[derive(Serialize)]
struct TxOverviewDto {
    tx_hash: Hash,
    height: Height,
    time_stamp: u64,
    #[serde(rename = "type")]
    tx_type: TxType,
    fee: Amount,
    size: u64,
    senders: Vec<OverviewSideDto>,
    receivers: Vec<OverviewSideDto>,
    payload_size: u64,
}

async fn wallet_overview(
    State(ctx): State<ApiContext>,
    Path(hash): Path<String>,
) -> Result<Json<TxOverviewDto>, ApiError> {
    let hash = params::hash(&hash)?;
    let record = ctx
        .store
        .get_tx(hash)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;

    let inputs: Vec<Hash> = record.tx.inputs.iter().map(|i| i.utxo).collect();
    let senders = ctx
        .store
        .utxos_by_keys(inputs)
        .await?
        .into_iter()
        .map(|utxo| OverviewSideDto {
            address: utxo.address,
            amount: utxo.amount,
            utxo: Some(utxo.utxo_key),
        })
        .collect();

    let receivers = record
        .tx
        .outputs
        .iter()
        .map(|output| OverviewSideDto {
            address: output.address(),
            amount: output.amount,
            utxo: None,
        })
        .collect();

    Ok(Json(TxOverviewDto {
        tx_hash: record.hash,
        height: record.height,
        time_stamp: record.time_stamp,
        tx_type: record.tx.tx_type,
        fee: record.fee,
        size: record.size,
        senders,
        receivers,
        payload_size: record.tx.payload.len() as u64,
    }))
}

#[derive(Serialize)]
struct PendingTxDto {
    tx_hash: Hash,
    size: u64,
    tx: Transaction,
}

async fn wallet_pending(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<Vec<PendingTxDto>>, ApiError> {
    let address = params::address(&address)?;
    let pending = ctx.store.pending_of(address).await?;
    Ok(Json(
        pending
            .into_iter()
            .map(|record| PendingTxDto {
                tx_hash: record.hash,
                size: record.size,
                tx: record.tx,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
struct BlockHeaderDto {
    height: Height,
    hash: Hash,
    prev_block: Hash,
    merkle_root: Hash,
    random_seed: Hash,
    time_stamp: u64,
    time_offset: u64,
}

impl From<BlockRecord> for BlockHeaderDto {
    fn from(record: BlockRecord) -> Self {
        Self {
            height: record.height(),
            hash: record.hash,
            prev_block: record.header.prev_block,
            merkle_root: record.header.merkle_root,
            random_seed: record.header.random_seed,
            time_stamp: record.time_stamp,
            time_offset: record.header.time_offset,
        }
    }
}

async fn wallet_block_header(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<BlockHeaderDto>, ApiError> {
    let selector = params::opt_height(&query)?.map(BlockSelector::Height);
    let record = ctx
        .store
        .get_block(selector)
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;
    Ok(Json(record.into()))
}

// ----------------------------------------------------------------------
// Explorer
// ----------------------------------------------------------------------

#[derive(Serialize)]
struct BlockSummaryDto {
    height: Height,
    hash: Hash,
    prev_block: Hash,
    merkle_root: Hash,
    random_seed: Hash,
    time_stamp: u64,
    tx_count: u64,
    enrollment_count: u64,
    total_sent: Amount,
    total_fees: Amount,
}

impl From<BlockRecord> for BlockSummaryDto {
    fn from(record: BlockRecord) -> Self {
        Self {
            height: record.height(),
            hash: record.hash,
            prev_block: record.header.prev_block,
            merkle_root: record.header.merkle_root,
            random_seed: record.header.random_seed,
            time_stamp: record.time_stamp,
            tx_count: record.tx_hashes.len() as u64,
            enrollment_count: record.header.enrollments.len() as u64,
            total_sent: record.total_sent,
            total_fees: record.total_fees,
        }
    }
}

async fn latest_blocks(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<BlockSummaryDto>>, ApiError> {
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx.store.latest_blocks(page, page_size).await?;
    Ok(Json(paged.into()))
}

#[derive(Serialize)]
struct TxSummaryDto {
    height: Height,
    tx_hash: Hash,
    #[serde(rename = "type")]
    tx_type: TxType,
    amount: Amount,
    fee: Amount,
    size: u64,
    time_stamp: u64,
}

impl From<TxRecord> for TxSummaryDto {
    fn from(record: TxRecord) -> Self {
        let amount = record.tx.outputs.iter().map(|o| o.amount).sum();
        Self {
            height: record.height,
            tx_hash: record.hash,
            tx_type: record.tx.tx_type,
            amount,
            fee: record.fee,
            size: record.size,
            time_stamp: record.time_stamp,
        }
    }
}

async fn latest_transactions(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<TxSummaryDto>>, ApiError> {
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx.store.latest_txs(page, page_size).await?;
    Ok(Json(paged.into()))
}

async fn block_summary(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<BlockSummaryDto>, ApiError> {
    let selector = block_selector(&query)?;
    let record = ctx
        .store
        .get_block(Some(selector))
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;
    Ok(Json(record.into()))
}

#[derive(Serialize)]
struct EnrollmentDto {
    utxo_key: Hash,
    address: Address,
    commitment: Hash,
    cycle_length: u64,
    enrolled_at: Height,
}

impl From<EnrollmentRecord> for EnrollmentDto {
    fn from(record: EnrollmentRecord) -> Self {
        Self {
            utxo_key: record.utxo_key,
            address: record.address,
            commitment: record.commitment,
            cycle_length: record.cycle_length,
            enrolled_at: record.enrolled_at,
        }
    }
}

async fn block_enrollments(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<EnrollmentDto>>, ApiError> {
    let selector = block_selector(&query)?;
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx
        .store
        .block_enrollments(selector, page, page_size)
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;
    Ok(Json(paged.into()))
}

async fn block_transactions(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<TxSummaryDto>>, ApiError> {
    let selector = block_selector(&query)?;
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx
        .store
        .block_txs(selector, page, page_size)
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;
    Ok(Json(paged.into()))
}

#[derive(Serialize)]
struct StatsDto {
    height: Height,
    transactions: u64,
    validators: u64,
    frozen_coin: Amount,
    total_supply: Amount,
    circulating_supply: Amount,
}

async fn boa_stats(State(ctx): State<ApiContext>) -> Result<Json<StatsDto>, ApiError> {
    let stats = ctx.store.chain_stats().await?;
    Ok(Json(StatsDto {
        height: stats.height,
        transactions: stats.tx_count,
        validators: stats.validator_count,
        frozen_coin: stats.frozen_supply,
        total_supply: stats.total_supply,
        circulating_supply: stats.total_supply.saturating_sub(stats.frozen_supply),
    }))
}

#[derive(Serialize)]
struct HolderDto {
    address: Address,
    total: Amount,
    spendable: Amount,
    frozen: Amount,
}

async fn holders(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<HolderDto>>, ApiError> {
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx.store.holders(page, page_size).await?;
    Ok(Json(PagedDto {
        items: paged
            .items
            .into_iter()
            .map(|(address, balance)| HolderDto {
                address,
                total: balance.total(),
                spendable: balance.spendable,
                frozen: balance.frozen,
            })
            .collect(),
        total: paged.total,
    }))
}

// ----------------------------------------------------------------------
// SPV
// ----------------------------------------------------------------------

#[derive(Serialize)]
struct SpvDto {
    result: bool,
    message: String,
}

async fn spv(
    State(ctx): State<ApiContext>,
    Path(hash): Path<String>,
) -> Result<Json<SpvDto>, ApiError> {
    let hash = params::hash(&hash)?;
    let record = ctx
        .store
        .get_tx(hash)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;
    let block = ctx
        .store
        .get_block(Some(BlockSelector::Height(record.height)))
        .await?
        .ok_or_else(|| ApiError::not_found("block not found"))?;

    let path = ctx
        .agora
        .get_merkle_path(record.height, &hash)
        .await
        .map_err(ApiError::Upstream)?;

    let root = fold_merkle_path(hash, record.index as u64, &path);
    if root == block.header.merkle_root {
        Ok(Json(SpvDto {
            result: true,
            message: "Success".into(),
        }))
    } else {
        Ok(Json(SpvDto {
            result: false,
            message: "Verification failed".into(),
        }))
    }
}

// ----------------------------------------------------------------------
// Governance
// ----------------------------------------------------------------------

#[derive(Serialize)]
struct ProposalDto {
    proposal_id: String,
    app_name: String,
    #[serde(rename = "type")]
    proposal_type: basilica_types::payload::ProposalType,
    title: String,
    status: ProposalStatus,
    result: ProposalResult,
    vote_start_height: Height,
    vote_end_height: Height,
    doc_hash: Hash,
    fund_amount: Amount,
    proposal_fee: Amount,
    vote_fee: Amount,
    proposer_address: Address,
    fee_destination: Address,
    tx_hash: Hash,
    created_at: Height,
    yes_count: u64,
    no_count: u64,
    blank_count: u64,
    reject_count: u64,
    committee_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ProposalMetadata>,
}

impl From<crate::store::records::ProposalRecord> for ProposalDto {
    fn from(record: crate::store::records::ProposalRecord) -> Self {
        Self {
            proposal_id: record.payload.proposal_id,
            app_name: record.payload.app_name,
            proposal_type: record.payload.proposal_type,
            title: record.payload.title,
            status: record.status,
            result: record.result,
            vote_start_height: record.payload.vote_start_height,
            vote_end_height: record.payload.vote_end_height,
            doc_hash: record.payload.doc_hash,
            fund_amount: record.payload.fund_amount,
            proposal_fee: record.payload.proposal_fee,
            vote_fee: record.payload.vote_fee,
            proposer_address: record.payload.proposer_address,
            fee_destination: record.payload.fee_destination,
            tx_hash: record.tx_hash,
            created_at: record.created_at,
            yes_count: record.yes_count,
            no_count: record.no_count,
            blank_count: record.blank_count,
            reject_count: record.reject_count,
            committee_size: record.committee_size,
            metadata: record.metadata,
        }
    }
}

async fn proposals(
    State(ctx): State<ApiContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PagedDto<ProposalDto>>, ApiError> {
    let Pagination { page, page_size } = params::pagination(&query)?;
    let paged = ctx.store.proposals(page, page_size).await?;
    Ok(Json(paged.into()))
}

#[derive(Serialize)]
struct BallotDto {
    validator: Address,
    height: Height,
    sequence: u32,
    ballot_answer: String,
}

#[derive(Serialize)]
struct ProposalDetailDto {
    #[serde(flatten)]
    proposal: ProposalDto,
    voter_count: u64,
    ballots: Vec<BallotDto>,
}

async fn proposal(
    State(ctx): State<ApiContext>,
    Path(proposal_id): Path<String>,
) -> Result<Json<ProposalDetailDto>, ApiError> {
    let Some((record, ballots)) = ctx.store.proposal(proposal_id).await? else {
        return Err(ApiError::not_found("proposal not found"));
    };

    let voter_count = ballots
        .iter()
        .filter(|b| b.disposition.is_accepted())
        .map(|b| b.validator)
        .collect::<std::collections::BTreeSet<_>>()
        .len() as u64;

    let ballots = ballots
        .into_iter()
        .map(|ballot| {
            let ballot_answer = match ballot.disposition {
                BallotDisposition::Accepted => "ACCEPTED".to_owned(),
                BallotDisposition::Counted(choice) => format!("{choice:?}").to_uppercase(),
                BallotDisposition::Reject(_) => "REJECT".to_owned(),
            };
            BallotDto {
                validator: ballot.validator,
                height: ballot.height,
                sequence: ballot.sequence,
                ballot_answer,
            }
        })
        .collect();

    Ok(Json(ProposalDetailDto {
        proposal: record.into(),
        voter_count,
        ballots,
    }))
}
