//! Collaborator interfaces consumed by the engine.
//!
//! The engine never talks to hardware or the radio directly. A host (the
//! tokio runtime in `meshcomm-node`, firmware glue, or the mock in
//! [`crate::testing`]) implements these four traits and passes itself as
//! the `Platform` into every transition function.

use std::time::Duration;

use meshcomm_core::{BufRef, ClusterId, Endpoint, ProfileId, ShortAddr};

use crate::error::{BufferError, SendError};
use crate::timer::{TimerHandle, TimerPurpose};

/// Fixed pool of stack message buffers.
pub trait BufferPool {
    /// Lease a free buffer, or `None` if the pool is exhausted.
    fn alloc(&mut self) -> Option<BufRef>;

    /// Ask for a buffer to be delivered later, as an expiry of `purpose`
    /// carrying the buffer, once one is free.
    fn alloc_delayed(&mut self, purpose: TimerPurpose) -> Result<(), BufferError>;

    /// Return a lease to the pool.
    fn release(&mut self, buf: BufRef);

    /// Reset the buffer and reserve `size` bytes of payload for an outgoing frame.
    fn initial_alloc(&mut self, buf: &BufRef, size: usize) -> Result<&mut [u8], BufferError>;

    /// Current payload of a buffer.
    fn payload(&self, buf: &BufRef) -> &[u8];

    /// Replace the payload of a buffer with `data`.
    fn write_payload(&mut self, buf: &BufRef, data: &[u8]) -> Result<(), BufferError> {
        self.initial_alloc(buf, data.len())?.copy_from_slice(data);
        Ok(())
    }
}

/// One-shot alarm service keyed by purpose.
pub trait Scheduler {
    /// Monotonic time since the node started.
    fn now(&self) -> Duration;

    /// Arrange for `purpose` to fire after `delay`, handing `buf` back on expiry.
    ///
    /// Callers must cancel any pending timer of the same purpose first; see
    /// [`crate::timer::arm`].
    fn schedule(&mut self, purpose: TimerPurpose, delay: Duration, buf: Option<BufRef>)
    -> TimerHandle;

    /// Cancel the pending timer of `purpose`, returning the buffer it held.
    ///
    /// A no-op returning `None` when nothing is pending.
    fn cancel(&mut self, purpose: TimerPurpose) -> Option<BufRef>;

    fn is_pending(&self, purpose: TimerPurpose) -> bool;
}

/// Which top-level commissioning procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommissioningMode {
    /// Resume from stored network credentials.
    Initialization,
    /// Search for and join a network, or open ours for joiners.
    NetworkSteering,
    /// Form a new network and open it.
    SteeringAndFormation,
}

/// Where a cluster command goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclTarget {
    pub dst_addr: ShortAddr,
    pub dst_endpoint: Endpoint,
    pub src_endpoint: Endpoint,
    pub profile: ProfileId,
    pub cluster: ClusterId,
}

/// The network stack's application-facing API.
pub trait RadioStack {
    /// Whether there are no stored network credentials.
    fn is_factory_new(&self) -> bool;

    /// Start a top-level commissioning procedure.
    ///
    /// Returns `false` if the stack refused because a procedure is still running.
    fn start_commissioning(&mut self, mode: CommissioningMode) -> bool;

    fn set_rx_on_when_idle(&mut self, rx_on: bool);

    /// Enter low-power sleep now.
    fn sleep_now(&mut self);

    /// Broadcast the match-descriptor request encoded in `buf`.
    ///
    /// On success the stack owns the buffer; responses come back through
    /// the signal ingress.
    fn send_match_desc(&mut self, buf: BufRef) -> Result<(), SendError>;

    /// Send the cluster command frame encoded in `buf`.
    fn send_zcl(&mut self, buf: BufRef, target: ZclTarget) -> Result<(), SendError>;
}

/// Board LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Network joined / open for joiners.
    Network,
    /// A controllable peer has been discovered.
    PeerFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(pub u8);

/// Board LEDs and buttons.
pub trait Board {
    fn set_indicator(&mut self, indicator: Indicator, on: bool);

    fn is_button_pressed(&self, button: ButtonId) -> bool;
}

/// Everything the engine needs from its host.
pub trait Platform: BufferPool + Scheduler + RadioStack + Board {}

impl<T: BufferPool + Scheduler + RadioStack + Board> Platform for T {}
