//! TCP listener and heartbeat monitor for the master.
//!
//! One connection carries one request and one response (spec §4.1): the
//! master reads a single JSON value, dispatches it, writes the response and
//! closes the connection. A background task sweeps for silent nodes every
//! ~2s under the same state lock the handlers use.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::master::{handlers, Master};
use crate::protocol::{read_json, write_json, MasterRequest};

const HEARTBEAT_MONITOR_PERIOD: Duration = Duration::from_secs(2);

/// Bind and serve forever. Spawns the heartbeat monitor alongside the
/// accept loop.
pub async fn run(master: Arc<Master>) -> anyhow::Result<()> {
    let addr = master.config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "master listening");

    tokio::spawn(heartbeat_monitor(master.clone()));

    loop {
        let (stream, peer) = listener.accept().await?;
        let master = master.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&master, stream).await {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(master: &Master, mut stream: TcpStream) -> anyhow::Result<()> {
    let connection_timeout = Duration::from_secs(master.config.connection_timeout_secs);

    let request: MasterRequest = match timeout(connection_timeout, read_json(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(_)) | Err(_) => return Ok(()), // malformed/truncated/timed out: close silently
    };

    if let Some(response) = handlers::handle(master, request) {
        let _ = timeout(connection_timeout, write_json(&mut stream, &response)).await;
    }
    Ok(())
}

async fn heartbeat_monitor(master: Arc<Master>) {
    let mut interval = tokio::time::interval(HEARTBEAT_MONITOR_PERIOD);
    loop {
        interval.tick().await;
        master.sweep_dead_nodes();
    }
}
