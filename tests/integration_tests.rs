/// End-to-end tests driving a live master and one or more storage nodes over
/// loopback TCP, covering the scenarios in spec.md §8.
use std::sync::Arc;
use std::time::Duration;

use datamesh_dfs::client::Client;
use datamesh_dfs::config::{MasterConfig, NodeConfig};
use datamesh_dfs::master::{self, Master};
use datamesh_dfs::node;
use tempfile::TempDir;

/// Binds an ephemeral master and returns its address alongside the handle
/// tests use to force liveness transitions. `master::run` binds its own
/// listener from `config.addr()`, so a free port is resolved by a throwaway
/// probe bind first, then handed to the real config.
async fn spawn_master(heartbeat_timeout_secs: u64) -> (Arc<Master>, String) {
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let mut config = MasterConfig::default();
    config.port = addr.port();
    config.heartbeat_timeout_secs = heartbeat_timeout_secs;
    let master = Arc::new(Master::new(config));
    let master_for_run = master.clone();
    tokio::spawn(async move {
        let _ = master::run(master_for_run).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (master, addr.to_string())
}

async fn spawn_node(node_id: &str, master_addr: &str, storage_dir: &std::path::Path) -> String {
    spawn_node_with_interval(node_id, master_addr, storage_dir, 3).await.0
}

/// Like [`spawn_node`] but with a configurable heartbeat interval and with
/// the task handle returned so a test can `abort()` it to simulate a node
/// that stops heartbeating (spec.md §8 scenario 3's "kill N1").
async fn spawn_node_with_interval(
    node_id: &str,
    master_addr: &str,
    storage_dir: &std::path::Path,
    heartbeat_interval_secs: u64,
) -> (String, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = NodeConfig::new(
        node_id.to_string(),
        "127.0.0.1".to_string(),
        addr.port(),
        master_addr.to_string(),
    );
    config.storage_dir = storage_dir.to_path_buf();
    config.heartbeat_interval_secs = heartbeat_interval_secs;
    let handle = tokio::spawn(node::run(config));
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr.to_string(), handle)
}

#[tokio::test]
async fn three_node_cluster_single_upload() {
    let (_master, master_addr) = spawn_master(10).await;
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();
    let d3 = TempDir::new().unwrap();
    spawn_node("n1", &master_addr, d1.path()).await;
    spawn_node("n2", &master_addr, d2.path()).await;
    spawn_node("n3", &master_addr, d3.path()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let src_dir = TempDir::new().unwrap();
    let src = src_dir.path().join("hello.txt");
    tokio::fs::write(&src, b"hi\n").await.unwrap();

    let client = Client::new(&master_addr);
    let nodes = client.upload(&src).await.unwrap();
    assert_eq!(nodes.len(), 2, "REPLICATION_FACTOR defaults to 2");

    let files = client.list_files().await.unwrap();
    assert_eq!(files, vec!["hello.txt".to_string()]);

    let landed = [d1.path(), d2.path(), d3.path()]
        .iter()
        .filter(|d| d.join("hello.txt").exists())
        .count();
    assert_eq!(landed, 2);
}

#[tokio::test]
async fn concurrent_writers_are_mutually_exclusive() {
    let (master, _addr) = spawn_master(10).await;

    assert!(master.lock_request("x", "client-a"));
    assert!(!master.lock_request("x", "client-b"));

    master.lock_release("x", "client-a");
    assert!(master.lock_request("x", "client-b"));
}

#[tokio::test]
async fn dead_replica_is_filtered_from_download() {
    // n2 heartbeats every 1s, comfortably inside the master's 2s timeout;
    // n1 is killed outright (its task aborted, heartbeat included) right
    // after the upload, so only it crosses the silence threshold.
    let (master, master_addr) = spawn_master(2).await;
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();
    let (n1_addr, n1_handle) = spawn_node_with_interval("n1", &master_addr, d1.path(), 60).await;
    spawn_node_with_interval("n2", &master_addr, d2.path(), 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let data: Vec<u8> = (0..10_000u32).map(|b| (b % 256) as u8).collect();
    let src_dir = TempDir::new().unwrap();
    let src = src_dir.path().join("a.bin");
    tokio::fs::write(&src, &data).await.unwrap();

    let client = Client::new(&master_addr);
    client.upload(&src).await.unwrap();

    n1_handle.abort();
    tokio::time::sleep(Duration::from_millis(2_300)).await;
    master.sweep_dead_nodes();

    let status = client.nodes_status().await.unwrap();
    let n1_dead = status
        .iter()
        .any(|s| s.address == n1_addr && s.status == datamesh_dfs::protocol::NodeStatus::Dead);
    assert!(n1_dead, "n1 should have been swept dead after its silence window");

    let dest_dir = TempDir::new().unwrap();
    let dest = dest_dir.path().join("a_out.bin");
    client.download("a.bin", Some(&dest)).await.unwrap();
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
}

#[tokio::test]
async fn delete_propagates_to_nodes_and_metadata() {
    let (_master, master_addr) = spawn_master(10).await;
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();
    spawn_node("n1", &master_addr, d1.path()).await;
    spawn_node("n2", &master_addr, d2.path()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let src_dir = TempDir::new().unwrap();
    let src = src_dir.path().join("b.txt");
    tokio::fs::write(&src, b"bytes").await.unwrap();

    let client = Client::new(&master_addr);
    client.upload(&src).await.unwrap();

    client.delete("b.txt").await.unwrap();

    assert!(!d1.path().join("b.txt").exists());
    assert!(!d2.path().join("b.txt").exists());
    assert!(client.list_files().await.unwrap().is_empty());
    assert!(client.download("b.txt", None).await.is_err());
}

#[tokio::test]
async fn download_filename_with_path_segments_resolves_to_basename() {
    let (_master, master_addr) = spawn_master(10).await;
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();
    spawn_node("n1", &master_addr, d1.path()).await;
    spawn_node("n2", &master_addr, d2.path()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The client reduces any local path to its basename before picking a
    // DFS key (spec.md §4.3); node-level traversal guarding on the wire
    // format itself is covered directly in node::server's own tests.
    let src_dir = TempDir::new().unwrap();
    let src = src_dir.path().join("evil");
    tokio::fs::write(&src, b"X").await.unwrap();

    let client = Client::new(&master_addr);
    let nodes = client.upload(&src).await.unwrap();
    assert!(!nodes.is_empty());

    let dest_dir = TempDir::new().unwrap();
    let dest = dest_dir.path().join("out");
    client.download("../../evil", Some(&dest)).await.unwrap();
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"X");
}

#[tokio::test]
async fn all_replicas_dead_reports_error_but_file_info_still_lists_them() {
    let (master, master_addr) = spawn_master(0).await;
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();
    spawn_node("n1", &master_addr, d1.path()).await;
    spawn_node("n2", &master_addr, d2.path()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let src_dir = TempDir::new().unwrap();
    let src = src_dir.path().join("c");
    tokio::fs::write(&src, b"c-bytes").await.unwrap();

    let client = Client::new(&master_addr);
    client.upload(&src).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    master.sweep_dead_nodes();

    let err = client.download("c", None).await.unwrap_err();
    assert!(err.to_string().contains("No alive replicas"));

    let info = client.file_info("c").await.unwrap();
    assert_eq!(info.len(), 2);
    assert!(info.iter().all(|r| !r.alive));
}
