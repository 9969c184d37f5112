//! Storage node binary.
//!
//! Usage: `node <node_id> <port> [--host HOST] [--master ADDR] [--storage-dir DIR]`
//! mirroring `original_source/storage_node.py`'s `node_id`/`port` positional
//! arguments.

use std::path::PathBuf;

use clap::Parser;
use datamesh_dfs::config::{NodeConfig, DEFAULT_MASTER_HOST, DEFAULT_MASTER_PORT};
use datamesh_dfs::logging;
use datamesh_dfs::node;

#[derive(Parser, Debug)]
#[command(name = "node", about = "DFS storage node")]
struct Args {
    node_id: String,
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    master: Option<String>,

    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("datamesh_dfs=info");

    let args = Args::parse();
    let master_addr = args
        .master
        .unwrap_or_else(|| format!("{DEFAULT_MASTER_HOST}:{DEFAULT_MASTER_PORT}"));

    let mut config = NodeConfig::new(args.node_id, args.host, args.port, master_addr);
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    node::run(config).await
}
