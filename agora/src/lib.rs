//! Client for the Agora consensus node's read endpoints.

pub mod client;

pub use client::{AgoraClient, ConsensusReader};
