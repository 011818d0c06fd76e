//! Engine settings: role, timing, discovery target, button mapping.
//!
//! Hosts build these from their own configuration; the defaults match a
//! coordinator acting as a dimmer switch for a single light.

use std::time::Duration;

use meshcomm_core::constants::{
    BROADCAST_RX_ON_WHEN_IDLE, CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, HA_PROFILE_ID,
};
use meshcomm_core::{ClusterId, Endpoint, MatchDescRequest, ProfileId, ShortAddr};

use crate::platform::ButtonId;

/// Network role the node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Forms the network when factory new.
    Coordinator,
    Router,
    EndDevice,
}

impl NodeRole {
    /// Whether a factory-new node of this role forms its own network.
    pub fn forms_network(self) -> bool {
        matches!(self, NodeRole::Coordinator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Delay before re-running commissioning after a failure.
    pub retry_delay: Duration,
    /// Delay between arming discovery (or a timeout) and sending the query.
    pub discovery_start_delay: Duration,
    /// How long a discovery round waits for a response.
    pub discovery_timeout: Duration,
    /// How long the network indicator stays on after steering.
    pub commissioning_window: Duration,
    /// How long a light button must be held before it dims instead of switching.
    pub long_press_threshold: Duration,
    /// Poll period while waiting to see whether a press becomes a long press.
    pub button_short_poll: Duration,
    /// Repeat period of dim steps while a button stays held.
    pub button_long_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            discovery_start_delay: Duration::from_secs(2),
            discovery_timeout: Duration::from_secs(5),
            commissioning_window: Duration::from_secs(180),
            long_press_threshold: Duration::from_secs(1),
            button_short_poll: Duration::from_millis(50),
            button_long_poll: Duration::from_millis(300),
        }
    }
}

/// The capability set a controller looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryTarget {
    /// Broadcast address selecting which devices answer.
    pub role_filter: ShortAddr,
    pub profile: ProfileId,
    pub clusters: Vec<ClusterId>,
}

impl DiscoveryTarget {
    pub fn request(&self) -> MatchDescRequest {
        MatchDescRequest::servers(self.role_filter, self.profile, &self.clusters)
    }
}

impl Default for DiscoveryTarget {
    fn default() -> Self {
        Self {
            role_filter: BROADCAST_RX_ON_WHEN_IDLE,
            profile: HA_PROFILE_ID,
            clusters: vec![CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap {
    /// Restarts commissioning.
    pub retry: ButtonId,
    pub light_on: ButtonId,
    pub light_off: ButtonId,
    /// Held at boot to make the node a sleepy device.
    pub sleepy: ButtonId,
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self {
            retry: ButtonId(0),
            light_off: ButtonId(1),
            sleepy: ButtonId(2),
            light_on: ButtonId(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub role: NodeRole,
    /// Whether this node looks for a peer and sends it commands.
    pub controller: bool,
    /// Don't open the network automatically after first start.
    pub manual_steering: bool,
    /// Local endpoint commands are sent from.
    pub local_endpoint: Endpoint,
    pub timing: Timing,
    pub discovery: DiscoveryTarget,
    pub buttons: ButtonMap,
    /// Level step size for each dim command.
    pub dim_step: u8,
    /// Transition time of each dim step, in tenths of a second.
    pub dim_transition_time: u16,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            role: NodeRole::Coordinator,
            controller: true,
            manual_steering: false,
            local_endpoint: Endpoint::new(1),
            timing: Timing::default(),
            discovery: DiscoveryTarget::default(),
            buttons: ButtonMap::default(),
            dim_step: 15,
            dim_transition_time: 2,
        }
    }
}
