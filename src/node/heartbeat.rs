//! Registration and periodic heartbeat to the master.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::warn;

use crate::config::NodeConfig;
use crate::protocol::{read_json, write_json};

async fn send_to_master(master_addr: &str, message: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let mut stream = TcpStream::connect(master_addr).await?;
    write_json(&mut stream, message).await?;
    let resp = read_json(&mut stream).await?;
    Ok(resp)
}

pub async fn register(config: &NodeConfig) -> anyhow::Result<()> {
    let msg = serde_json::json!({
        "type": "REGISTER_NODE",
        "node_id": config.node_id,
        "addr": config.addr(),
    });
    let resp = send_to_master(&config.master_addr, &msg).await?;
    tracing::info!(node_id = %config.node_id, response = %resp, "registered with master");
    Ok(())
}

/// Sends a HEARTBEAT every `heartbeat_interval_secs`, forever. Failures are
/// logged and swallowed (spec §4.2): a master that is briefly unreachable
/// must not crash the node.
pub async fn run(config: NodeConfig) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.heartbeat_interval_secs));
    loop {
        interval.tick().await;
        let msg = serde_json::json!({ "type": "HEARTBEAT", "node_id": config.node_id });
        if let Err(e) = send_to_master(&config.master_addr, &msg).await {
            warn!(node_id = %config.node_id, error = %e, "heartbeat failed");
        }
    }
}
