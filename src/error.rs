//! Error types shared by the master, storage node and client library.

use thiserror::Error;

/// Errors surfaced by any component of the distributed file system.
#[derive(Debug, Error)]
pub enum DfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed or unexpected message: {0}")]
    Protocol(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Locked(String),

    #[error("no nodes available: {0}")]
    NodeUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type DfsResult<T> = Result<T, DfsError>;
