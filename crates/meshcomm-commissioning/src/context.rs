//! Process-wide node context.
//!
//! One `NodeContext` exists for the life of the node. It starts zeroed (no
//! peer, button released, `Uninitialized`) and is mutated only by the
//! transition functions, which receive it by `&mut`.

use std::time::Duration;

use meshcomm_core::{Endpoint, ShortAddr};

use crate::platform::ButtonId;
use crate::settings::NodeSettings;

/// Membership lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommissioningState {
    #[default]
    Uninitialized,
    /// Forming a new network (and opening it).
    Forming,
    /// Joining an existing network or resuming stored credentials.
    Joining,
    SteeringInProgress,
    Joined,
    /// Left the network; waits for a rejoin or manual retry.
    Left,
    /// Commissioning failed; a retry is scheduled.
    SteeringFailed,
}

impl CommissioningState {
    /// Whether a commissioning procedure is currently running in the stack.
    pub fn is_commissioning(self) -> bool {
        matches!(
            self,
            CommissioningState::Forming
                | CommissioningState::Joining
                | CommissioningState::SteeringInProgress
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommissioningState::Uninitialized => "uninitialized",
            CommissioningState::Forming => "forming",
            CommissioningState::Joining => "joining",
            CommissioningState::SteeringInProgress => "steering",
            CommissioningState::Joined => "joined",
            CommissioningState::Left => "left",
            CommissioningState::SteeringFailed => "steering-failed",
        }
    }
}

/// The peer found by discovery.
///
/// Address and endpoint are stored together, so one can't be set without
/// the other. Short address 0x0000 (the coordinator) is a valid peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveredPeer {
    found: Option<(ShortAddr, Endpoint)>,
}

impl DiscoveredPeer {
    pub fn is_recorded(&self) -> bool {
        self.found.is_some()
    }

    pub fn network_address(&self) -> Option<ShortAddr> {
        self.found.map(|(addr, _)| addr)
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.found.map(|(_, ep)| ep)
    }

    pub fn get(&self) -> Option<(ShortAddr, Endpoint)> {
        self.found
    }

    /// Record a peer if none is recorded yet. Returns whether it was recorded.
    pub fn record(&mut self, addr: ShortAddr, endpoint: Endpoint) -> bool {
        if self.found.is_some() {
            return false;
        }
        self.found = Some((addr, endpoint));
        true
    }

    /// Forget the peer; only a new discovery round does this.
    pub fn clear(&mut self) {
        self.found = None;
    }
}

/// Light button being held, for long-press detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub held: bool,
    pub press_started_at: Duration,
    pub button: Option<ButtonId>,
}

impl ButtonState {
    pub fn press(&mut self, button: ButtonId, now: Duration) {
        self.held = true;
        self.press_started_at = now;
        self.button = Some(button);
    }

    pub fn release(&mut self) {
        *self = ButtonState::default();
    }

    pub fn held_for(&self, now: Duration) -> Duration {
        now.saturating_sub(self.press_started_at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    pub settings: NodeSettings,
    pub state: CommissioningState,
    pub peer: DiscoveredPeer,
    pub button: ButtonState,
    /// Whether the stack's sleep offers are accepted.
    pub sleep_capable: bool,
    zcl_seq: u8,
}

impl NodeContext {
    pub fn new(settings: NodeSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Move to `next`, logging the transition.
    pub fn transition(&mut self, next: CommissioningState) {
        if self.state != next {
            tracing::debug!(from = self.state.as_str(), to = next.as_str(), "commissioning state");
            self.state = next;
        }
    }

    /// Next ZCL transaction sequence number.
    pub fn next_zcl_seq(&mut self) -> u8 {
        let seq = self.zcl_seq;
        self.zcl_seq = self.zcl_seq.wrapping_add(1);
        seq
    }
}
