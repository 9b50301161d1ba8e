//! HTTP reader of the Agora consensus node.
//!
//! Basilica never writes to Agora; this client serves the recovery path
//! (tip height, block ranges) and SPV queries (merkle paths).

use core::time::Duration;

use async_trait::async_trait;
use basilica_types::{Block, Hash, Height};
use color_eyre::eyre::{self, eyre, WrapErr};
use reqwest::{Client, Url};

/// Pull interface to the consensus node. The production implementation is
/// [`AgoraClient`]; tests substitute their own ledgers.
#[async_trait]
pub trait ConsensusReader: Send + Sync {
    /// Current tip height of the remote ledger.
    async fn get_tip_height(&self) -> eyre::Result<Height>;

    /// A contiguous run of blocks starting at `start`, possibly shorter
    /// than `count`.
    async fn get_blocks_from(&self, start: Height, count: u64) -> eyre::Result<Vec<Block>>;

    /// Sibling hashes for the SPV audit path of `tx_hash` in the block at
    /// `height`.
    async fn get_merkle_path(&self, height: Height, tx_hash: &Hash) -> eyre::Result<Vec<Hash>>;
}

pub const BLOCK_HEIGHT_PATH: &str = "block_height";
pub const BLOCK_HEIGHT_TIMEOUT: Duration = Duration::from_secs(2);

pub const BLOCKS_FROM_PATH: &str = "blocks_from";
pub const BLOCKS_FROM_TIMEOUT: Duration = Duration::from_secs(10);

pub const MERKLE_PATH_PATH: &str = "merkle_path";
pub const MERKLE_PATH_TIMEOUT: Duration = Duration::from_secs(4);

/// Read-only client for the consensus node's public endpoints.
#[derive(Clone)]
pub struct AgoraClient {
    client: Client,
    url: Url,
}

impl core::fmt::Display for AgoraClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[async_trait]
impl ConsensusReader for AgoraClient {
    async fn get_tip_height(&self) -> eyre::Result<Height> {
        self.tip_height().await
    }

    async fn get_blocks_from(&self, start: Height, count: u64) -> eyre::Result<Vec<Block>> {
        self.blocks_from(start, count).await
    }

    async fn get_merkle_path(&self, height: Height, tx_hash: &Hash) -> eyre::Result<Vec<Hash>> {
        self.merkle_path(height, tx_hash).await
    }
}

impl AgoraClient {
    pub fn new(url: Url) -> eyre::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> eyre::Result<Url> {
        let mut url = self.url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| eyre!("agora endpoint cannot be a base URL"))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    /// Current tip height of the remote ledger.
    pub async fn tip_height(&self) -> eyre::Result<Height> {
        let url = self.endpoint(&[BLOCK_HEIGHT_PATH])?;
        let body = self
            .client
            .get(url)
            .timeout(BLOCK_HEIGHT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        // Agora encodes the height as a bare number or a quoted decimal.
        let height = body
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .wrap_err_with(|| format!("unparseable block height: {body:?}"))?;

        Ok(Height::new(height))
    }

    /// A contiguous run of blocks starting at `start`, possibly shorter
    /// than `count` when the node trims the response.
    pub async fn blocks_from(&self, start: Height, count: u64) -> eyre::Result<Vec<Block>> {
        let mut url = self.endpoint(&[BLOCKS_FROM_PATH])?;
        url.query_pairs_mut()
            .append_pair("height", &start.to_string())
            .append_pair("max_blocks", &count.to_string());

        let blocks: Vec<Block> = self
            .client
            .get(url)
            .timeout(BLOCKS_FROM_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(%start, requested = count, received = blocks.len(), "fetched block range");
        Ok(blocks)
    }

    /// Sibling hashes needed to recompute the merkle root of the block at
    /// `height` from `tx_hash`.
    pub async fn merkle_path(&self, height: Height, tx_hash: &Hash) -> eyre::Result<Vec<Hash>> {
        let url = self.endpoint(&[MERKLE_PATH_PATH, &height.to_string(), &tx_hash.to_hex()])?;

        let path: Vec<Hash> = self
            .client
            .get(url)
            .timeout(MERKLE_PATH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(path)
    }
}
