//! The coordinator: node registry, liveness tracking, replica placement,
//! the file table and the per-filename write-lock table.

mod handlers;
mod server;
mod state;

pub use server::run;
pub use state::{Master, MasterState};
