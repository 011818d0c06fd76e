//! Error types for the node runtime.

use meshcomm_commissioning::BufferError;

/// Errors that can occur while setting up or running a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("node not started")]
    NotStarted,
    #[error("node already running")]
    AlreadyRunning,
}
