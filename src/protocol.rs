//! Wire types and framing for the master's and storage nodes' control-plane
//! protocol: one JSON object per request, one JSON object per response, UTF-8,
//! no length prefix.
//!
//! The reference implementation reads a single `recv(4096)` and assumes it
//! holds a complete value. That is fragile (spec §6, REDESIGN FLAGS), so
//! [`read_json`] accumulates bytes across reads and retries parsing until a
//! full JSON value is available.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DfsError, DfsResult};

/// Read one complete JSON value from `stream`, accumulating across partial
/// reads. Returns the value together with any bytes already read past the
/// end of the JSON value — callers whose protocol follows the JSON with a
/// raw byte payload (file transfer headers) must treat this as the start of
/// that payload rather than discarding it.
///
/// Returns `Protocol` if the peer closes the connection before any bytes
/// arrive, or `Serialization` if the accumulated bytes never form a valid
/// `T` and the peer has closed the connection.
pub async fn read_json_framed<T, S>(stream: &mut S) -> DfsResult<(T, Vec<u8>)>
where
    T: DeserializeOwned,
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let mut de = serde_json::Deserializer::from_slice(&buf);
        match T::deserialize(&mut de) {
            Ok(value) => {
                let offset = de.byte_offset();
                return Ok((value, buf[offset..].to_vec()));
            }
            Err(e) if e.is_eof() => {}
            Err(e) => return Err(DfsError::Serialization(e)),
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(DfsError::Protocol("connection closed with no data".into()));
            }
            return serde_json::from_slice::<T>(&buf)
                .map(|value| (value, Vec::new()))
                .map_err(DfsError::Serialization);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Read one complete JSON value and discard anything read past it. Use for
/// exchanges where nothing follows the JSON value on the wire.
pub async fn read_json<T, S>(stream: &mut S) -> DfsResult<T>
where
    T: DeserializeOwned,
    S: AsyncRead + Unpin,
{
    read_json_framed(stream).await.map(|(value, _)| value)
}

/// Serialize `value` and write it in full to `stream`.
pub async fn write_json<T, S>(stream: &mut S, value: &T) -> DfsResult<()>
where
    T: Serialize + Sync,
    S: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(value)?;
    stream.write_all(&bytes).await?;
    Ok(())
}

/// Messages accepted by the master's TCP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MasterRequest {
    #[serde(rename = "REGISTER_NODE")]
    RegisterNode { node_id: String, addr: String },

    #[serde(rename = "HEARTBEAT")]
    Heartbeat { node_id: String },

    #[serde(rename = "LOCK_REQUEST")]
    LockRequest { filename: String, client_id: String },

    #[serde(rename = "LOCK_RELEASE")]
    LockRelease { filename: String, client_id: String },

    #[serde(rename = "LIST_FILES")]
    ListFiles,

    #[serde(rename = "NODES_STATUS")]
    NodesStatus,

    #[serde(rename = "UPLOAD_REQUEST")]
    UploadRequest { filename: String },

    #[serde(rename = "UPLOAD_DONE")]
    UploadDone { filename: String, nodes: Vec<String> },

    #[serde(rename = "DOWNLOAD_REQUEST")]
    DownloadRequest { filename: String },

    #[serde(rename = "FILE_INFO")]
    FileInfo { filename: String },

    #[serde(rename = "DELETE_DONE")]
    DeleteDone { filename: String },
}

/// Messages accepted by a storage node's TCP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NodeRequest {
    #[serde(rename = "UPLOAD_FILE")]
    UploadFile {
        filename: String,
        #[serde(default)]
        size: Option<u64>,
    },

    #[serde(rename = "DOWNLOAD_FILE")]
    DownloadFile { filename: String },

    #[serde(rename = "DELETE_FILE")]
    DeleteFile { filename: String },
}

/// Reported liveness of one node, as returned by `NODES_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    #[serde(rename = "ALIVE")]
    Alive,
    #[serde(rename = "DEAD")]
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    pub id: String,
    pub address: String,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReplicaInfo {
    pub node_id: Option<String>,
    pub address: String,
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_single_line_request() {
        let payload = br#"{"type":"HEARTBEAT","node_id":"n1"}"#.to_vec();
        let mut cursor = Cursor::new(payload);
        let req: MasterRequest = read_json(&mut cursor).await.unwrap();
        match req {
            MasterRequest::Heartbeat { node_id } => assert_eq!(node_id, "n1"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn parses_request_with_no_fields() {
        let payload = br#"{"type":"LIST_FILES"}"#.to_vec();
        let mut cursor = Cursor::new(payload);
        let req: MasterRequest = read_json(&mut cursor).await.unwrap();
        assert!(matches!(req, MasterRequest::ListFiles));
    }

    #[tokio::test]
    async fn leftover_bytes_after_json_are_preserved() {
        let mut payload = br#"{"type":"LIST_FILES"}"#.to_vec();
        payload.extend_from_slice(b"trailing-payload");
        let mut cursor = Cursor::new(payload);
        let (req, leftover): (MasterRequest, Vec<u8>) = read_json_framed(&mut cursor).await.unwrap();
        assert!(matches!(req, MasterRequest::ListFiles));
        assert_eq!(leftover, b"trailing-payload");
    }

    #[tokio::test]
    async fn rejects_unknown_type() {
        let payload = br#"{"type":"BOGUS"}"#.to_vec();
        let mut cursor = Cursor::new(payload);
        let res: DfsResult<MasterRequest> = read_json(&mut cursor).await;
        assert!(res.is_err());
    }
}
