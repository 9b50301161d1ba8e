//! Node wiring: opens the store, probes the consensus node, catches up,
//! then starts the mutator worker and both HTTP listeners.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use basilica_agora::{AgoraClient, ConsensusReader};
use color_eyre::eyre::{self, WrapErr};
use url::Url;

use crate::api::{self, ApiContext};
use crate::events::EventBus;
use crate::governance::metadata::MetadataClient;
use crate::ingest::{self, IngestWorker};
use crate::store::{LedgerParams, Store};

#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Public read API bind address.
    pub listen: SocketAddr,
    /// Private intake bind address; only the consensus node should reach it.
    pub private_listen: SocketAddr,
    pub agora_endpoint: Url,
    pub database_path: PathBuf,
    pub ledger: LedgerParams,
    pub metadata_endpoint: Option<Url>,
    pub queue_size: usize,
    pub queue_warn_depth: usize,
}

pub struct Node {
    config: NodeConfig,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Runs the node until one of its tasks fails. Boot is fail-fast: an
    /// unopenable store or an unreachable consensus node aborts startup;
    /// everything after that is recoverable and only logged.
    pub async fn run(self) -> eyre::Result<()> {
        let config = self.config;

        let store = Store::open(&config.database_path, config.ledger.clone())
            .await
            .wrap_err_with(|| format!("cannot open store at {}", config.database_path.display()))?;

        let agora: Arc<dyn ConsensusReader> =
            Arc::new(AgoraClient::new(config.agora_endpoint.clone())?);
        let metadata = config
            .metadata_endpoint
            .clone()
            .map(MetadataClient::new)
            .transpose()?;

        let events = Arc::new(EventBus::new());
        let (ingest_handle, receiver) = ingest::channel(config.queue_size, config.queue_warn_depth);
        let worker = IngestWorker::new(
            store.clone(),
            Arc::clone(&agora),
            Arc::clone(&events),
            metadata,
            receiver,
        );

        // Reconcile with the consensus tip before ingress opens.
        worker
            .catch_up()
            .await
            .wrap_err_with(|| format!("initial catch-up against {} failed", config.agora_endpoint))?;

        let worker_task = tokio::spawn(worker.run());

        let context = ApiContext {
            store,
            agora,
            events,
            ingest: ingest_handle,
        };
        let private = tokio::spawn(api::serve_private(context.clone(), config.private_listen));
        let public = tokio::spawn(api::serve_public(context, config.listen));

        tokio::select! {
            result = worker_task => {
                result.wrap_err("ingest worker panicked")?;
                Err(eyre::eyre!("ingest worker halted"))
            }
            result = private => result.wrap_err("private listener panicked")?,
            result = public => result.wrap_err("public listener panicked")?,
        }
    }
}
