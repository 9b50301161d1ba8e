//! Fan-out of committed work to push subscribers.
//!
//! Subscribers hold the receiving half of a small bounded channel; the
//! bus never blocks the mutator on a slow consumer. A full channel drops
//! that delivery, a closed one drops the subscriber.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use basilica_types::{Hash, Height, Transaction};
use tokio::sync::mpsc;

use crate::store::records::ChainStats;
use crate::store::CommittedBlock;

/// Per-subscriber buffer; a subscriber this far behind starts losing
/// events rather than stalling commits.
pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Clone, Debug)]
pub enum Event {
    NewBlock {
        height: Height,
        hash: Hash,
        time_stamp: u64,
    },
    NewTransactions(Vec<TxEventItem>),
    LatestStats(ChainStats),
}

#[derive(Clone, Debug)]
pub struct TxEventItem {
    pub height: Height,
    pub block_hash: Hash,
    pub tx_hash: Hash,
    pub tx: Transaction,
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Event>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(Subscriber { id, sender });
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .len()
    }

    /// Best-effort delivery to every live subscriber.
    pub fn publish(&self, event: &Event) {
        let mut subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(subscriber = subscriber.id, "subscriber lagging, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// The per-commit event triple, in order: block, transactions, stats.
    pub fn publish_commit(&self, committed: &CommittedBlock) {
        self.publish(&Event::NewBlock {
            height: committed.block.height(),
            hash: committed.block.hash,
            time_stamp: committed.block.time_stamp,
        });

        let items: Vec<TxEventItem> = committed
            .txs
            .iter()
            .map(|record| TxEventItem {
                height: record.height,
                block_hash: committed.block.hash,
                tx_hash: record.hash,
                tx: record.tx.clone(),
            })
            .collect();
        self.publish(&Event::NewTransactions(items));

        self.publish(&Event::LatestStats(committed.stats.clone()));
    }
}
