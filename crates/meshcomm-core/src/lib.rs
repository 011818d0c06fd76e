//! Core types, constants, and frame formats for mesh node commissioning.
//!
//! This crate defines the addressing newtypes, stack signal tags and their
//! payload layouts, the match-descriptor (ZDO) and cluster command (ZCL)
//! frame codecs, and the opaque buffer reference shared by the stack and
//! the commissioning engine.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod constants;
pub mod error;
pub mod signal;
pub mod types;
pub mod zcl;
pub mod zdo;

pub use buffer::BufRef;
pub use error::{CodecError, PayloadError};
pub use signal::{LeaveType, Signal, SignalTag};
pub use types::{ClusterId, Endpoint, IeeeAddr, ProfileId, ShortAddr, Status};
pub use zdo::{MatchDescRequest, MatchDescResponse};
