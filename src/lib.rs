//! A minimal distributed file system: a coordinating master, a fleet of
//! storage nodes, and the client library that drives upload/download/delete
//! against them over TCP.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod master;
pub mod node;
pub mod protocol;

pub use client::Client;
pub use error::{DfsError, DfsResult};
