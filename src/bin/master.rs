//! Master binary: parses its bind configuration, then serves the
//! coordination-plane protocol until killed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use datamesh_dfs::config::MasterConfig;
use datamesh_dfs::master::{self, Master};
use datamesh_dfs::logging;

#[derive(Parser, Debug)]
#[command(name = "master", about = "DFS coordinator")]
struct Args {
    /// Optional TOML config file; CLI flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    replication_factor: Option<usize>,

    #[arg(long)]
    heartbeat_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("datamesh_dfs=info");

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => MasterConfig::from_file(path)?,
        None => MasterConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(factor) = args.replication_factor {
        config.replication_factor = factor;
    }
    if let Some(timeout) = args.heartbeat_timeout_secs {
        config.heartbeat_timeout_secs = timeout;
    }

    let master = Arc::new(Master::new(config));
    master::run(master).await
}
