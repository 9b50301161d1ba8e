//! Configuration loading: a TOML file with serde defaults, overridable
//! through `BASILICA__`-prefixed environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use basilica::node::NodeConfig;
use basilica::store::LedgerParams;
use serde::Deserialize;
use url::Url;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_agora_endpoint")]
    pub agora_endpoint: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_private_port")]
    pub private_port: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub genesis_timestamp: u64,
    #[serde(default = "default_block_interval")]
    pub block_interval_seconds: u64,
    #[serde(default = "default_validator_cycle")]
    pub validator_cycle: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata_endpoint: String,
    #[serde(default = "default_grace_blocks")]
    pub grace_blocks: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_queue_depth_warning")]
    pub queue_depth_warning: usize,
}

fn default_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3836
}

fn default_private_port() -> u16 {
    3837
}

fn default_agora_endpoint() -> String {
    "http://127.0.0.1:2826".into()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("basilica.redb")
}

fn default_block_interval() -> u64 {
    600
}

fn default_validator_cycle() -> u64 {
    1008
}

fn default_true() -> bool {
    true
}

fn default_grace_blocks() -> u64 {
    7
}

fn default_queue_size() -> usize {
    4096
}

fn default_queue_depth_warning() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            private_port: default_private_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            genesis_timestamp: 0,
            block_interval_seconds: default_block_interval(),
            validator_cycle: default_validator_cycle(),
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metadata_endpoint: String::new(),
            grace_blocks: default_grace_blocks(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            queue_depth_warning: default_queue_depth_warning(),
        }
    }
}

impl Config {
    /// Loads the file (when present) and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, Error> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("BASILICA").separator("__"))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| Error::LoadConfig(path.to_owned(), e))
    }

    pub fn into_node_config(self) -> Result<NodeConfig, Error> {
        let ip: IpAddr = self
            .server
            .address
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("bad server.address: {}", self.server.address)))?;

        let agora_endpoint = Url::parse(&self.agora_endpoint)
            .map_err(|e| Error::InvalidConfig(format!("bad agora_endpoint: {e}")))?;

        let metadata_endpoint = if self.governance.metadata_endpoint.is_empty() {
            None
        } else {
            Some(
                Url::parse(&self.governance.metadata_endpoint)
                    .map_err(|e| Error::InvalidConfig(format!("bad metadata_endpoint: {e}")))?,
            )
        };

        if self.consensus.block_interval_seconds == 0 {
            return Err(Error::InvalidConfig(
                "consensus.block_interval_seconds cannot be 0".into(),
            ));
        }
        if self.consensus.validator_cycle == 0 {
            return Err(Error::InvalidConfig(
                "consensus.validator_cycle cannot be 0".into(),
            ));
        }

        Ok(NodeConfig {
            listen: SocketAddr::new(ip, self.server.port),
            private_listen: SocketAddr::new(ip, self.server.private_port),
            agora_endpoint,
            database_path: self.database.path,
            ledger: LedgerParams {
                genesis_timestamp: self.consensus.genesis_timestamp,
                block_interval: self.consensus.block_interval_seconds,
                validator_cycle: self.consensus.validator_cycle,
                governance_enabled: self.governance.enabled,
                grace_blocks: self.governance.grace_blocks,
            },
            metadata_endpoint,
            queue_size: self.ingest.queue_size,
            queue_warn_depth: self.ingest.queue_depth_warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_make_a_valid_node_config() {
        let config = Config::load(Path::new("does-not-exist.toml")).unwrap();
        let node = config.into_node_config().unwrap();
        assert_eq!(node.listen.port(), 3836);
        assert_eq!(node.private_listen.port(), 3837);
        assert_eq!(node.ledger.validator_cycle, 1008);
        assert!(node.metadata_endpoint.is_none());
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let mut config = Config::load(Path::new("does-not-exist.toml")).unwrap();
        config.server.address = "not-an-ip".into();
        assert!(config.into_node_config().is_err());
    }
}
