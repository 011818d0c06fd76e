//! Error types for the commissioning engine's collaborators.
//!
//! None of these escape the engine: handlers log them and carry on, since
//! every failure the stack can report is either retried or ignored.

use meshcomm_core::{BufRef, CodecError};

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("buffer pool exhausted")]
    Exhausted,

    #[error("payload too large: {requested} bytes (buffer holds {capacity})")]
    PayloadTooLarge { requested: usize, capacity: usize },

    #[error("unknown buffer reference #{0}")]
    UnknownBuffer(u8),

    #[error("encoding failed: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("stack is not on a network")]
    NotJoined,

    #[error("transmit queue full")]
    QueueFull,

    #[error("stack rejected request: status {0}")]
    Rejected(i32),
}

/// A send that failed before the stack took ownership of the buffer.
///
/// The buffer comes back so the caller can release it.
#[derive(Debug, thiserror::Error)]
#[error("send failed: {reason}")]
pub struct SendError {
    pub buf: BufRef,
    pub reason: StackError,
}
