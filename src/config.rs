//! Configuration for the master and storage node binaries.
//!
//! Defaults match spec §6: `REPLICATION_FACTOR=2`, `HEARTBEAT_TIMEOUT=10s`,
//! `HEARTBEAT_INTERVAL=3s`, master bound to `127.0.0.1:5000`. Values can be
//! overridden by an optional TOML file and then by CLI flags, in that order.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DfsError, DfsResult};

pub const DEFAULT_MASTER_HOST: &str = "127.0.0.1";
pub const DEFAULT_MASTER_PORT: u16 = 5000;
pub const DEFAULT_REPLICATION_FACTOR: usize = 2;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Master-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub host: String,
    pub port: u16,
    pub replication_factor: usize,
    pub heartbeat_timeout_secs: u64,
    pub connection_timeout_secs: u64,
    /// Optional bounded lock lease. `None` reproduces the reference
    /// behavior: a lock held by a crashed client is never reclaimed.
    /// See DESIGN.md, "Lock liveness".
    pub lock_lease_secs: Option<u64>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            host: DEFAULT_MASTER_HOST.to_string(),
            port: DEFAULT_MASTER_PORT,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            lock_lease_secs: None,
        }
    }
}

impl MasterConfig {
    pub fn from_file(path: &PathBuf) -> DfsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| DfsError::Config(e.to_string()))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage-node-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub master_addr: String,
    pub storage_dir: PathBuf,
    pub heartbeat_interval_secs: u64,
    pub connection_timeout_secs: u64,
}

impl NodeConfig {
    pub fn new(node_id: String, host: String, port: u16, master_addr: String) -> Self {
        let storage_dir = PathBuf::from(format!("storage_{node_id}"));
        NodeConfig {
            node_id,
            host,
            port,
            master_addr,
            storage_dir,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
