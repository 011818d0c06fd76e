//! Host runtime for a commissioning mesh node.
//!
//! This crate drives the commissioning engine on tokio: TOML configuration,
//! a buffer pool, a task-per-timer scheduler, a simulated radio stack, and
//! an operator console standing in for the board's buttons.

pub mod board;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod node;
pub mod platform;
pub mod pool;
pub mod scheduler;
pub mod sim;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{Node, ShutdownHandle, WorkItem};
