//! Error types for the meshcomm-core crate.

use core::fmt;

/// A signal payload read from a stack buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    TooShort { min: usize, actual: usize },
    InvalidLeaveType(u8),
    /// The match list length byte claims more endpoints than the payload holds.
    MatchListTruncated { declared: usize, actual: usize },
    UnknownCommand { cluster: u16, command: u8 },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::TooShort { min, actual } => {
                write!(
                    f,
                    "payload too short: need at least {min} bytes, got {actual}"
                )
            }
            PayloadError::InvalidLeaveType(v) => write!(f, "invalid leave type: {v}"),
            PayloadError::MatchListTruncated { declared, actual } => {
                write!(
                    f,
                    "match list truncated: declared {declared} endpoints, got {actual}"
                )
            }
            PayloadError::UnknownCommand { cluster, command } => {
                write!(f, "unknown command 0x{command:02x} on cluster 0x{cluster:04x}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PayloadError {}

/// An outgoing frame could not be encoded into the space available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    BufferTooSmall { needed: usize, available: usize },
    TooManyClusters(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small: need {needed} bytes, have {available}")
            }
            CodecError::TooManyClusters(n) => {
                write!(f, "too many clusters in request: {n} (max 255)")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}
