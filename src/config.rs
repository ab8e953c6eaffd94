// src/config.rs

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::roster::{NodeEntry, NodeId};

/// Top-level configuration of one node of the fleet.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This node's identity within the genesis roster.
    pub node_id: NodeId,
    pub genesis: GenesisConfig,
}

/// Schedule parameters fixed at genesis. Identical on every node of the
/// fleet; any divergence here splits proposer eligibility.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisConfig {
    /// Unix timestamp (seconds) at which slot 0 starts.
    pub first_block_time_unix: u64,
    /// Generation budget of a proposer, in milliseconds.
    pub block_gen_time_ms: u64,
    /// Idle window between consecutive blocks, in milliseconds.
    #[serde(default)]
    pub blocks_gap_ms: u64,
    /// The permissioned fleet, in any order; the roster derives the
    /// deterministic ordering itself.
    pub validators: Vec<NodeEntry>,
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading node config {}", path.display()))?;
        let cfg: NodeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing node config {}", path.display()))?;
        Ok(cfg)
    }
}

impl GenesisConfig {
    #[inline]
    pub fn first_block_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.first_block_time_unix)
    }

    #[inline]
    pub fn block_gen_time(&self) -> Duration {
        Duration::from_millis(self.block_gen_time_ms)
    }

    #[inline]
    pub fn blocks_gap(&self) -> Duration {
        Duration::from_millis(self.blocks_gap_ms)
    }
}
