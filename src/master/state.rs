//! Process-wide master state: one owning structure guarded by a single
//! mutex, per spec §5 ("all four maps... live behind a single mutual
//! exclusion region"). `nodes` is a `BTreeMap` rather than a `HashMap` so
//! that placement order is the node_id's sort order — an explicit,
//! observable ordering independent of hash iteration (spec §9).

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::MasterConfig;
use crate::protocol::{FileReplicaInfo, NodeStatus, NodeStatusEntry};

#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub addr: String,
    pub last_heartbeat: Instant,
    pub alive: bool,
}

/// The three shared maps plus their single mutex.
#[derive(Debug, Default)]
pub struct MasterState {
    pub nodes: BTreeMap<String, NodeRecord>,
    pub file_table: BTreeMap<String, Vec<String>>,
    pub file_locks: BTreeMap<String, String>,
}

pub struct Master {
    pub config: MasterConfig,
    state: Mutex<MasterState>,
}

impl Master {
    pub fn new(config: MasterConfig) -> Self {
        Master {
            config,
            state: Mutex::new(MasterState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MasterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register_node(&self, node_id: String, addr: String) {
        let mut state = self.lock();
        state.nodes.insert(
            node_id.clone(),
            NodeRecord {
                addr: addr.clone(),
                last_heartbeat: Instant::now(),
                alive: true,
            },
        );
        drop(state);
        info!(node_id = %node_id, %addr, "node registered");
    }

    pub fn heartbeat(&self, node_id: &str) {
        let mut state = self.lock();
        if let Some(record) = state.nodes.get_mut(node_id) {
            record.last_heartbeat = Instant::now();
            let was_dead = !record.alive;
            record.alive = true;
            drop(state);
            if was_dead {
                info!(%node_id, "node back ALIVE");
            }
        }
    }

    /// Grants the lock iff unheld or already held by `client_id`
    /// (re-entrant). Returns `true` on grant.
    pub fn lock_request(&self, filename: &str, client_id: &str) -> bool {
        let mut state = self.lock();
        match state.file_locks.get(filename) {
            None => {
                state.file_locks.insert(filename.to_string(), client_id.to_string());
                true
            }
            Some(holder) if holder == client_id => true,
            Some(_) => false,
        }
    }

    pub fn lock_release(&self, filename: &str, client_id: &str) {
        let mut state = self.lock();
        if state.file_locks.get(filename).map(String::as_str) == Some(client_id) {
            state.file_locks.remove(filename);
        }
    }

    pub fn list_files(&self) -> Vec<String> {
        self.lock().file_table.keys().cloned().collect()
    }

    pub fn nodes_status(&self) -> Vec<NodeStatusEntry> {
        self.lock()
            .nodes
            .iter()
            .map(|(id, record)| NodeStatusEntry {
                id: id.clone(),
                address: record.addr.clone(),
                status: if record.alive { NodeStatus::Alive } else { NodeStatus::Dead },
            })
            .collect()
    }

    /// Up to `replication_factor` alive node addresses, in node_id order.
    pub fn choose_nodes(&self) -> Vec<String> {
        let state = self.lock();
        state
            .nodes
            .iter()
            .filter(|(_, record)| record.alive)
            .take(self.config.replication_factor)
            .map(|(_, record)| record.addr.clone())
            .collect()
    }

    pub fn upload_done(&self, filename: String, nodes: Vec<String>) {
        let mut state = self.lock();
        state.file_table.insert(filename, nodes);
    }

    /// `Ok(addrs)` filtered to currently alive nodes, `Err(message)` per
    /// spec's "File not found" / "No alive replicas" cases.
    pub fn download_request(&self, filename: &str) -> Result<Vec<String>, String> {
        let state = self.lock();
        let addrs = state
            .file_table
            .get(filename)
            .ok_or_else(|| "File not found".to_string())?
            .clone();

        let alive: Vec<String> = addrs
            .into_iter()
            .filter(|addr| {
                state
                    .nodes
                    .values()
                    .any(|record| &record.addr == addr && record.alive)
            })
            .collect();

        if alive.is_empty() {
            Err("No alive replicas".to_string())
        } else {
            Ok(alive)
        }
    }

    pub fn file_info(&self, filename: &str) -> Option<Vec<FileReplicaInfo>> {
        let state = self.lock();
        let addrs = state.file_table.get(filename)?.clone();

        let replicas = addrs
            .into_iter()
            .map(|addr| {
                let found = state.nodes.iter().find(|(_, record)| record.addr == addr);
                match found {
                    Some((node_id, record)) => FileReplicaInfo {
                        node_id: Some(node_id.clone()),
                        address: addr,
                        alive: record.alive,
                    },
                    None => FileReplicaInfo { node_id: None, address: addr, alive: false },
                }
            })
            .collect();
        Some(replicas)
    }

    pub fn delete_done(&self, filename: &str) {
        self.lock().file_table.remove(filename);
    }

    /// Scans for nodes silent longer than `heartbeat_timeout_secs` and
    /// flips them dead. Called by the heartbeat monitor every ~2s under
    /// the same exclusion as the request handlers.
    pub fn sweep_dead_nodes(&self) {
        let timeout = std::time::Duration::from_secs(self.config.heartbeat_timeout_secs);
        let now = Instant::now();
        let mut newly_dead = Vec::new();

        {
            let mut state = self.lock();
            for (id, record) in state.nodes.iter_mut() {
                if record.alive && now.duration_since(record.last_heartbeat) > timeout {
                    record.alive = false;
                    newly_dead.push(id.clone());
                }
            }
        }

        for id in newly_dead {
            warn!(node_id = %id, "node is DEAD");
        }
    }
}
