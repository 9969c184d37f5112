//! Tracing setup shared by the master and node binaries.

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global tracing subscriber. Honors `RUST_LOG`, defaults to
/// `info` for this crate and `warn` for everything else.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already initialized (e.g. called twice in tests); not fatal.
        return;
    }
    info!("logging initialized");
}
