//! TCP listener for the storage node's data plane: one accepted connection
//! carries one JSON header followed, for uploads/downloads, by a raw byte
//! stream of exact length (spec §4.2, §6).

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::node::heartbeat;
use crate::node::storage;
use crate::protocol::{read_json_framed, write_json, NodeRequest};

const TRANSFER_CHUNK: usize = 4096;

pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.storage_dir).await?;

    heartbeat::register(&config).await?;
    tokio::spawn(heartbeat::run(config.clone()));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, storage_dir = ?config.storage_dir, node_id = %config.node_id, "node listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let storage_dir = config.storage_dir.clone();
        let node_id = config.node_id.clone();
        let connection_timeout = Duration::from_secs(config.connection_timeout_secs);
        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(&node_id, &storage_dir, stream, connection_timeout).await
            {
                warn!(%peer, node_id = %node_id, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(
    node_id: &str,
    storage_dir: &PathBuf,
    mut stream: TcpStream,
    connection_timeout: Duration,
) -> anyhow::Result<()> {
    let (header, leftover): (NodeRequest, Vec<u8>) =
        match timeout(connection_timeout, read_json_framed(&mut stream)).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(anyhow::anyhow!("timed out waiting for header")),
        };

    match header {
        NodeRequest::UploadFile { filename, size } => {
            handle_upload(node_id, storage_dir, &mut stream, &filename, size, leftover, connection_timeout).await
        }
        NodeRequest::DownloadFile { filename } => {
            handle_download(node_id, storage_dir, &mut stream, &filename, connection_timeout).await
        }
        NodeRequest::DeleteFile { filename } => {
            handle_delete(node_id, storage_dir, &mut stream, &filename).await
        }
    }
}

async fn handle_upload(
    node_id: &str,
    storage_dir: &PathBuf,
    stream: &mut TcpStream,
    filename: &str,
    size: Option<u64>,
    leftover: Vec<u8>,
    connection_timeout: Duration,
) -> anyhow::Result<()> {
    let dest = storage::resolve(storage_dir, filename);
    write_json(stream, &serde_json::json!({ "status": "ready" })).await?;

    let mut file = fs::File::create(&dest).await?;
    file.write_all(&leftover).await?;

    match size {
        Some(total) => {
            let mut remaining = total.saturating_sub(leftover.len() as u64);
            let mut buf = [0u8; TRANSFER_CHUNK];
            while remaining > 0 {
                let want = remaining.min(TRANSFER_CHUNK as u64) as usize;
                let n = timeout(connection_timeout, stream.read(&mut buf[..want])).await??;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n]).await?;
                remaining -= n as u64;
            }
        }
        None => {
            let mut buf = [0u8; TRANSFER_CHUNK];
            loop {
                let n = timeout(connection_timeout, stream.read(&mut buf)).await??;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n]).await?;
            }
        }
    }

    file.flush().await?;
    info!(node_id, filename = %storage::basename(filename), path = ?dest, "stored file");
    Ok(())
}

async fn handle_download(
    node_id: &str,
    storage_dir: &PathBuf,
    stream: &mut TcpStream,
    filename: &str,
    connection_timeout: Duration,
) -> anyhow::Result<()> {
    let src = storage::resolve(storage_dir, filename);

    let metadata = match fs::metadata(&src).await {
        Ok(m) => m,
        Err(_) => {
            write_json(stream, &serde_json::json!({"status": "error", "message": "File not found"})).await?;
            return Ok(());
        }
    };
    let size = metadata.len();

    write_json(stream, &serde_json::json!({ "status": "ok", "size": size })).await?;

    let mut file = fs::File::open(&src).await?;
    let mut buf = [0u8; TRANSFER_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        timeout(connection_timeout, stream.write_all(&buf[..n])).await??;
    }

    info!(node_id, filename = %storage::basename(filename), size, "sent file");
    Ok(())
}

async fn handle_delete(
    node_id: &str,
    storage_dir: &PathBuf,
    stream: &mut TcpStream,
    filename: &str,
) -> anyhow::Result<()> {
    let path = storage::resolve(storage_dir, filename);
    match fs::remove_file(&path).await {
        Ok(()) => {
            write_json(stream, &serde_json::json!({ "status": "ok", "message": "Deleted" })).await?;
            info!(node_id, filename = %storage::basename(filename), "deleted file");
        }
        Err(_) => {
            write_json(stream, &serde_json::json!({"status": "error", "message": "File not found"})).await?;
            debug!(node_id, filename = %storage::basename(filename), "delete: file not found");
        }
    }
    Ok(())
}
