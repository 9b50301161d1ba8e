//! CLI-level error messages.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error loading the configuration file
    #[error("Error loading configuration file {}: {}", .0.display(), .1)]
    LoadConfig(PathBuf, config::ConfigError),

    /// A configuration value failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
