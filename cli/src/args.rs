//! Command-line arguments.
//!
//! Configuration lives in the TOML file named by `--config`; the flags
//! here only locate it and tune logging.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const CONFIG_FILE: &str = "config.toml";

#[derive(Parser, Clone, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file (default: `./config.toml`)
    #[arg(long, global = true, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `basilica=debug` (default: `info`)
    #[arg(long, global = true, value_name = "LOG_LEVEL", env = "BASILICA_LOG")]
    pub log_level: Option<String>,

    /// Also log to this file
    #[arg(long, global = true, value_name = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the indexer (the default)
    Start,
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Path of the configuration file, defaulting to `./config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }
}
