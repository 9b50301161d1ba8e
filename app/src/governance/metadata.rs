//! Out-of-band proposal metadata.
//!
//! Pulled from the governance metadata service after a proposal
//! materializes. Strictly best-effort: a missing or failing service never
//! blocks status transitions, so every error path degrades to `None`.

use core::time::Duration;

use color_eyre::eyre;
use reqwest::{Client, StatusCode, Url};

use super::ProposalMetadata;

pub const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MetadataClient {
    client: Client,
    url: Url,
}

impl MetadataClient {
    pub fn new(url: Url) -> eyre::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            url,
        })
    }

    /// Metadata for `proposal_id`, or `None` when the service has nothing.
    pub async fn get_proposal(&self, proposal_id: &str) -> eyre::Result<Option<ProposalMetadata>> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|()| eyre::eyre!("metadata endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(["proposals", proposal_id]);

        let response = self
            .client
            .get(url)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::NO_CONTENT
        {
            return Ok(None);
        }

        let metadata = response.error_for_status()?.json().await?;
        Ok(Some(metadata))
    }
}
