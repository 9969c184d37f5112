//! Dispatches one parsed [`MasterRequest`] to a [`Master`] and builds the
//! matching JSON response. Each message type has its own response shape
//! (spec §4.1), so responses are built as ad hoc `serde_json::Value`s
//! rather than forced into one shared struct.

use serde_json::{json, Value};

use crate::master::Master;
use crate::protocol::MasterRequest;

/// `None` means the connection should be closed without a response
/// (malformed request or unknown type, per spec §4.1 failure semantics).
pub fn handle(master: &Master, request: MasterRequest) -> Option<Value> {
    let response = match request {
        MasterRequest::RegisterNode { node_id, addr } => {
            master.register_node(node_id, addr);
            json!({ "status": "ok" })
        }
        MasterRequest::Heartbeat { node_id } => {
            master.heartbeat(&node_id);
            json!({ "status": "ok" })
        }
        MasterRequest::LockRequest { filename, client_id } => {
            if master.lock_request(&filename, &client_id) {
                json!({ "status": "ok", "message": "Lock granted" })
            } else {
                json!({
                    "status": "locked",
                    "message": format!("File '{filename}' is currently locked by another client."),
                })
            }
        }
        MasterRequest::LockRelease { filename, client_id } => {
            master.lock_release(&filename, &client_id);
            json!({ "status": "ok" })
        }
        MasterRequest::ListFiles => {
            json!({ "files": master.list_files() })
        }
        MasterRequest::NodesStatus => {
            json!({ "nodes": master.nodes_status() })
        }
        MasterRequest::UploadRequest { filename: _ } => {
            json!({ "nodes": master.choose_nodes() })
        }
        MasterRequest::UploadDone { filename, nodes } => {
            master.upload_done(filename, nodes);
            json!({ "status": "ok" })
        }
        MasterRequest::DownloadRequest { filename } => match master.download_request(&filename) {
            Ok(nodes) => json!({ "status": "ok", "nodes": nodes }),
            Err(message) => json!({ "status": "error", "message": message }),
        },
        MasterRequest::FileInfo { filename } => match master.file_info(&filename) {
            Some(replicas) => json!({ "status": "ok", "replicas": replicas }),
            None => json!({ "status": "error", "message": "File not found" }),
        },
        MasterRequest::DeleteDone { filename } => {
            master.delete_done(&filename);
            json!({ "status": "ok" })
        }
    };
    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MasterConfig;

    #[test]
    fn upload_request_returns_empty_when_no_nodes_alive() {
        let master = Master::new(MasterConfig::default());
        let resp = handle(&master, MasterRequest::UploadRequest { filename: "f".into() }).unwrap();
        assert_eq!(resp["nodes"], json!([]));
    }

    #[test]
    fn download_request_unknown_file_reports_not_found() {
        let master = Master::new(MasterConfig::default());
        let resp =
            handle(&master, MasterRequest::DownloadRequest { filename: "nope".into() }).unwrap();
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "File not found");
    }

    #[test]
    fn lock_contention_reports_locked() {
        let master = Master::new(MasterConfig::default());
        handle(
            &master,
            MasterRequest::LockRequest { filename: "f".into(), client_id: "a".into() },
        );
        let resp = handle(
            &master,
            MasterRequest::LockRequest { filename: "f".into(), client_id: "b".into() },
        )
        .unwrap();
        assert_eq!(resp["status"], "locked");
    }
}
