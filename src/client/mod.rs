//! Client-side upload/download/delete orchestration (spec §4.3). Stateless
//! aside from a per-process `client_id` used as the write-lock holder
//! identity — generated once per [`Client`] lifetime, mirroring
//! `original_source/dfs_client_lib.py`'s `CLIENT_ID = str(uuid.uuid4())`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DfsError, DfsResult};
use crate::node::basename;
use crate::protocol::{read_json, read_json_framed, write_json, FileReplicaInfo, NodeStatusEntry};

const TRANSFER_CHUNK: usize = 4096;

pub struct Client {
    master_addr: String,
    client_id: String,
}

impl Client {
    pub fn new(master_addr: impl Into<String>) -> Self {
        Client { master_addr: master_addr.into(), client_id: Uuid::new_v4().to_string() }
    }

    /// The identity this client presents as a lock holder. Exposed mainly
    /// for tests that need to simulate a second, distinct client.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send_to_master(&self, message: &Value) -> DfsResult<Value> {
        let mut stream = TcpStream::connect(&self.master_addr).await?;
        write_json(&mut stream, message).await?;
        read_json(&mut stream).await
    }

    pub async fn list_files(&self) -> DfsResult<Vec<String>> {
        let resp = self.send_to_master(&serde_json::json!({ "type": "LIST_FILES" })).await?;
        Ok(serde_json::from_value(resp["files"].clone()).unwrap_or_default())
    }

    pub async fn nodes_status(&self) -> DfsResult<Vec<NodeStatusEntry>> {
        let resp = self.send_to_master(&serde_json::json!({ "type": "NODES_STATUS" })).await?;
        serde_json::from_value(resp["nodes"].clone()).map_err(DfsError::Serialization)
    }

    pub async fn file_info(&self, filename: &str) -> DfsResult<Vec<FileReplicaInfo>> {
        let filename = basename(filename);
        let resp = self
            .send_to_master(&serde_json::json!({ "type": "FILE_INFO", "filename": filename }))
            .await?;
        if resp["status"] == "ok" {
            serde_json::from_value(resp["replicas"].clone()).map_err(DfsError::Serialization)
        } else {
            Err(DfsError::NotFound(response_message(&resp, "File not found")))
        }
    }

    /// Upload `path` to the DFS under its basename. Acquires the write
    /// lock for the whole critical section, streams the bytes to every
    /// node the master chose, and releases the lock on every exit path —
    /// success or failure (spec §4.3, step 6).
    pub async fn upload(&self, path: impl AsRef<Path>) -> DfsResult<Vec<String>> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).await.map_err(|_| {
            DfsError::NotFound(format!("file {} not found", path.display()))
        })?;
        let filesize = metadata.len();
        let filename = basename(&path.to_string_lossy());

        let lock_resp = self
            .send_to_master(&serde_json::json!({
                "type": "LOCK_REQUEST",
                "filename": filename,
                "client_id": self.client_id,
            }))
            .await?;
        if lock_resp["status"] != "ok" {
            return Err(DfsError::Locked(response_message(
                &lock_resp,
                &format!("File '{filename}' is locked"),
            )));
        }

        let result = self.upload_body(&filename, path, filesize).await;

        let _ = self
            .send_to_master(&serde_json::json!({
                "type": "LOCK_RELEASE",
                "filename": filename,
                "client_id": self.client_id,
            }))
            .await;

        result
    }

    async fn upload_body(&self, filename: &str, path: &Path, filesize: u64) -> DfsResult<Vec<String>> {
        let resp = self
            .send_to_master(&serde_json::json!({ "type": "UPLOAD_REQUEST", "filename": filename }))
            .await?;
        let nodes: Vec<String> =
            serde_json::from_value(resp["nodes"].clone()).unwrap_or_default();
        if nodes.is_empty() {
            return Err(DfsError::NodeUnavailable("no nodes available for upload".into()));
        }

        let data = fs::read(path).await?;

        for addr in &nodes {
            upload_to_node(addr, filename, &data, filesize).await.map_err(|e| {
                DfsError::NodeUnavailable(format!("upload to {addr} failed: {e}"))
            })?;
        }

        self.send_to_master(&serde_json::json!({
            "type": "UPLOAD_DONE",
            "filename": filename,
            "nodes": nodes,
        }))
        .await?;

        Ok(nodes)
    }

    /// Download `filename` (a DFS basename, or any path — only the
    /// basename is used) to `save_as`, defaulting to the basename itself.
    pub async fn download(
        &self,
        filename: &str,
        save_as: Option<&Path>,
    ) -> DfsResult<PathBuf> {
        let dfs_name = basename(filename);
        let resp = self
            .send_to_master(&serde_json::json!({ "type": "DOWNLOAD_REQUEST", "filename": dfs_name }))
            .await?;
        if resp["status"] != "ok" {
            return Err(DfsError::NotFound(response_message(&resp, "Download failed")));
        }
        let nodes: Vec<String> =
            serde_json::from_value(resp["nodes"].clone()).unwrap_or_default();
        let target = nodes.first().ok_or_else(|| {
            DfsError::NodeUnavailable("no alive replicas returned by master".into())
        })?;

        let data = download_from_node(target, &dfs_name).await?;

        let dest = save_as.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(&dfs_name));
        fs::write(&dest, &data).await?;
        Ok(dest)
    }

    /// Delete `filename` from every replica the master knows about, then
    /// remove its metadata. Per-node delete errors are logged but do not
    /// fail the overall call (spec §4.3, §7 "Partial delete failure").
    pub async fn delete(&self, filename: &str) -> DfsResult<()> {
        let dfs_name = basename(filename);
        let resp = self
            .send_to_master(&serde_json::json!({ "type": "DOWNLOAD_REQUEST", "filename": dfs_name }))
            .await?;

        let nodes: Vec<String> =
            serde_json::from_value(resp["nodes"].clone()).unwrap_or_default();

        for addr in &nodes {
            if let Err(e) = delete_on_node(addr, &dfs_name).await {
                warn!(node = %addr, filename = %dfs_name, error = %e, "delete on node failed");
            }
        }

        let done = self
            .send_to_master(&serde_json::json!({ "type": "DELETE_DONE", "filename": dfs_name }))
            .await?;
        if done["status"] == "ok" {
            Ok(())
        } else {
            Err(DfsError::Protocol("master failed to remove metadata".into()))
        }
    }
}

fn response_message(resp: &Value, default: &str) -> String {
    resp.get("message").and_then(Value::as_str).unwrap_or(default).to_string()
}

async fn upload_to_node(addr: &str, filename: &str, data: &[u8], filesize: u64) -> DfsResult<()> {
    let mut stream = TcpStream::connect(addr).await?;
    write_json(
        &mut stream,
        &serde_json::json!({ "type": "UPLOAD_FILE", "filename": filename, "size": filesize }),
    )
    .await?;
    let ready: Value = read_json(&mut stream).await?;
    if ready["status"] != "ready" {
        return Err(DfsError::Protocol(format!("node {addr} not ready")));
    }
    stream.write_all(data).await?;
    Ok(())
}

async fn download_from_node(addr: &str, filename: &str) -> DfsResult<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    write_json(&mut stream, &serde_json::json!({ "type": "DOWNLOAD_FILE", "filename": filename }))
        .await?;
    let (info, mut data): (Value, Vec<u8>) = read_json_framed(&mut stream).await?;
    if info["status"] != "ok" {
        return Err(DfsError::NotFound(response_message(&info, "node error")));
    }
    let size = info["size"].as_u64().unwrap_or(0) as usize;

    let mut buf = [0u8; TRANSFER_CHUNK];
    while data.len() < size {
        let n = stream.read(&mut buf[..(size - data.len()).min(TRANSFER_CHUNK)]).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    Ok(data)
}

async fn delete_on_node(addr: &str, filename: &str) -> DfsResult<()> {
    let mut stream = TcpStream::connect(addr).await?;
    write_json(&mut stream, &serde_json::json!({ "type": "DELETE_FILE", "filename": filename }))
        .await?;
    let _resp: Value = read_json(&mut stream).await?;
    Ok(())
}
