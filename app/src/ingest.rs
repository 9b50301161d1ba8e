//! Serialized block intake.
//!
//! All mutation flows through one bounded channel into one worker task,
//! so commits are at-most-once and strictly ordered without any locking
//! between the projection's entities. The intake algorithm reconciles the
//! local expected height with whatever arrives: in-order blocks commit
//! directly, future blocks trigger gap recovery against the consensus
//! node, stale ones are idempotently dropped.

use std::sync::Arc;

use basilica_agora::ConsensusReader;
use basilica_types::{Block, Height, PreImageInfo, Transaction};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::EventBus;
use crate::governance::metadata::MetadataClient;
use crate::store::{Store, StoreError};

/// Most blocks fetched from the consensus node per recovery pass; larger
/// gaps complete across multiple passes.
pub const MAX_RECOVERY: u64 = 64;

/// Queued mutator work, in arrival order.
#[derive(Debug)]
pub enum IngestTask {
    Block(Box<Block>),
    PreImage(PreImageInfo),
    PoolTx(Box<Transaction>),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("consensus node unavailable: {0}")]
    Upstream(color_eyre::eyre::Report),
}

impl From<color_eyre::eyre::Report> for IngestError {
    fn from(report: color_eyre::eyre::Report) -> Self {
        Self::Upstream(report)
    }
}

/// Sending half handed to the private HTTP endpoints.
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestTask>,
    queue_size: usize,
    warn_depth: usize,
}

impl IngestHandle {
    /// Enqueues a task. The endpoint has already acknowledged with 200;
    /// when the queue is saturated the task is shed and recovery re-fetches
    /// the block later.
    pub fn submit(&self, task: IngestTask) {
        let depth = self.queue_size - self.sender.capacity();
        if depth >= self.warn_depth {
            warn!(depth, "ingest queue is deep");
        }

        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(?task, "ingest queue full, shedding task");
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                error!(?task, "ingest worker is gone, dropping task");
            }
        }
    }
}

/// Creates the intake channel. `queue_size` bounds memory; `warn_depth`
/// is the operational noise threshold.
pub fn channel(queue_size: usize, warn_depth: usize) -> (IngestHandle, mpsc::Receiver<IngestTask>) {
    let (sender, receiver) = mpsc::channel(queue_size);
    let handle = IngestHandle {
        sender,
        queue_size,
        warn_depth,
    };
    (handle, receiver)
}

/// The single mutator task.
pub struct IngestWorker {
    store: Store,
    agora: Arc<dyn ConsensusReader>,
    events: Arc<EventBus>,
    metadata: Option<MetadataClient>,
    receiver: mpsc::Receiver<IngestTask>,
}

impl IngestWorker {
    pub fn new(
        store: Store,
        agora: Arc<dyn ConsensusReader>,
        events: Arc<EventBus>,
        metadata: Option<MetadataClient>,
        receiver: mpsc::Receiver<IngestTask>,
    ) -> Self {
        Self {
            store,
            agora,
            events,
            metadata,
            receiver,
        }
    }

    /// Boot-time reconciliation: pull everything up to the consensus tip
    /// before ingress opens. Unreachable upstream here is fatal.
    pub async fn catch_up(&self) -> Result<(), IngestError> {
        let tip = self.agora.get_tip_height().await?;
        let expected = self.store.expected_next_height().await?;
        info!(%tip, local_next = %expected, "catching up with consensus node");

        if expected <= tip {
            self.recover_to(tip.increment()).await?;
        }
        Ok(())
    }

    /// Consumes the queue until it closes or the store fails. A store
    /// failure halts the worker: advancing past a failed commit would
    /// desynchronize the projection.
    pub async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            let result = match task {
                IngestTask::Block(block) => self.handle_block(*block).await,
                IngestTask::PreImage(info) => self.handle_preimage(info).await,
                IngestTask::PoolTx(tx) => self.handle_pool_tx(*tx).await,
            };

            if let Err(e) = result {
                error!(error = %e, "ingest task failed, halting mutator queue");
                break;
            }
        }
        info!("ingest worker stopped");
    }

    async fn handle_block(&self, block: Block) -> Result<(), StoreError> {
        let height = block.header.height;
        let expected = self.store.expected_next_height().await?;

        if height < expected {
            debug!(%height, %expected, "duplicate block, ignoring");
            return Ok(());
        }

        if height > expected {
            // Gap: backfill from the consensus node first. Fetch errors
            // leave the gap for the next submission to retry.
            if let Err(e) = self.recover_to(height).await {
                match e {
                    IngestError::Store(e) => return Err(e),
                    IngestError::Upstream(e) => {
                        warn!(error = %e, %height, "recovery fetch failed, leaving gap");
                        return Ok(());
                    }
                }
            }
        }

        match self.store.expected_next_height().await? {
            expected if expected == height => self.commit(block).await,
            expected if expected > height => {
                debug!(%height, "block already recovered, ignoring");
                Ok(())
            }
            expected => {
                warn!(%height, %expected, "gap remains after recovery, dropping block");
                Ok(())
            }
        }
    }

    /// Pulls blocks from the consensus node until the local expected
    /// height reaches `target`. The expected height is re-read each pass
    /// because recovery itself advances it.
    async fn recover_to(&self, target: Height) -> Result<(), IngestError> {
        loop {
            let expected = self.store.expected_next_height().await?;
            let Some(missing) = target.checked_sub(expected).filter(|n| *n > 0) else {
                return Ok(());
            };

            let count = missing.min(MAX_RECOVERY);
            info!(start = %expected, count, %target, "recovering block range");
            let blocks = self.agora.get_blocks_from(expected, count).await?;

            let mut next = expected;
            let mut progressed = false;
            for block in blocks {
                if block.header.height != next {
                    continue;
                }
                self.commit(block).await?;
                next = next.increment();
                progressed = true;
            }

            if !progressed {
                warn!(%expected, %target, "consensus node returned no usable blocks");
                return Ok(());
            }
        }
    }

    async fn commit(&self, block: Block) -> Result<(), StoreError> {
        let height = block.header.height;
        let committed = self.store.put_block(block).await?;
        info!(
            %height,
            hash = %committed.block.hash,
            txs = committed.txs.len(),
            "block committed"
        );

        // Events fan out strictly after the commit has durably returned.
        self.events.publish_commit(&committed);

        // Metadata enrichment is decoupled from consensus correctness:
        // fire-and-forget, failures only logged.
        if let Some(metadata) = &self.metadata {
            for proposal_id in committed.created_proposals {
                let metadata = metadata.clone();
                let store = self.store.clone();
                tokio::spawn(async move {
                    match metadata.get_proposal(&proposal_id).await {
                        Ok(Some(found)) => {
                            if let Err(e) = store.set_proposal_metadata(proposal_id.clone(), found).await
                            {
                                warn!(proposal = %proposal_id, error = %e, "failed to persist metadata");
                            }
                        }
                        Ok(None) => debug!(proposal = %proposal_id, "no metadata published"),
                        Err(e) => warn!(proposal = %proposal_id, error = %e, "metadata fetch failed"),
                    }
                });
            }
        }
        Ok(())
    }

    async fn handle_preimage(&self, info: PreImageInfo) -> Result<(), StoreError> {
        let changed = self.store.update_preimage(info.clone()).await?;
        if changed {
            debug!(utxo = %info.utxo, height = %info.height, "pre-image advanced");
        } else {
            // Unknown stakes and stale tips are expected out-of-order
            // deliveries, dropped without noise.
            debug!(utxo = %info.utxo, height = %info.height, "pre-image ignored");
        }
        Ok(())
    }

    async fn handle_pool_tx(&self, tx: Transaction) -> Result<(), StoreError> {
        let fresh = self.store.put_transaction_pool(tx).await?;
        if !fresh {
            debug!("pooled transaction already known");
        }
        Ok(())
    }
}
