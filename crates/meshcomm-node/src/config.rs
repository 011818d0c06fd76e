//! TOML-based configuration for mesh nodes.
//!
//! Every section is optional; an empty file describes a factory-new
//! coordinator that acts as a dimmer switch for one simulated light.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use meshcomm_commissioning::settings::{ButtonMap, DiscoveryTarget};
use meshcomm_commissioning::{ButtonId, NodeRole, NodeSettings, Timing};
use meshcomm_core::constants::{BROADCAST_ALL, BROADCAST_ROUTERS, BROADCAST_RX_ON_WHEN_IDLE};
use meshcomm_core::{ClusterId, Endpoint, ProfileId, ShortAddr};

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub buttons: ButtonsSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub simulation: SimulationSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self =
            toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NodeError> {
        if !(11..=26).contains(&self.node.channel) {
            return Err(NodeError::Config(format!(
                "channel {} outside 11..=26",
                self.node.channel
            )));
        }
        if self.pool.buffers == 0 || self.pool.buffers > 256 {
            return Err(NodeError::Config(format!(
                "pool.buffers must be in 1..=256, got {}",
                self.pool.buffers
            )));
        }
        if !(0.0..=1.0).contains(&self.simulation.failure_probability) {
            return Err(NodeError::Config(format!(
                "simulation.failure_probability must be in 0..=1, got {}",
                self.simulation.failure_probability
            )));
        }
        if self.discovery.clusters.is_empty() {
            return Err(NodeError::Config("discovery.clusters is empty".into()));
        }
        parse_role(&self.node.role)?;
        parse_target(&self.discovery.target)?;
        Ok(())
    }

    /// The engine settings this configuration describes.
    pub fn settings(&self) -> Result<NodeSettings, NodeError> {
        let t = &self.timing;
        Ok(NodeSettings {
            role: parse_role(&self.node.role)?,
            controller: self.node.controller,
            manual_steering: self.node.manual_steering,
            local_endpoint: Endpoint::new(self.node.local_endpoint),
            timing: Timing {
                retry_delay: Duration::from_millis(t.retry_delay_ms),
                discovery_start_delay: Duration::from_millis(t.discovery_start_delay_ms),
                discovery_timeout: Duration::from_millis(t.discovery_timeout_ms),
                commissioning_window: Duration::from_secs(t.commissioning_window_secs),
                long_press_threshold: Duration::from_millis(t.long_press_ms),
                button_short_poll: Duration::from_millis(t.button_short_poll_ms),
                button_long_poll: Duration::from_millis(t.button_long_poll_ms),
            },
            discovery: DiscoveryTarget {
                role_filter: parse_target(&self.discovery.target)?,
                profile: ProfileId::new(self.discovery.profile_id),
                clusters: self
                    .discovery
                    .clusters
                    .iter()
                    .copied()
                    .map(ClusterId::new)
                    .collect(),
            },
            buttons: ButtonMap {
                retry: ButtonId(self.buttons.retry),
                light_on: ButtonId(self.buttons.light_on),
                light_off: ButtonId(self.buttons.light_off),
                sleepy: ButtonId(self.buttons.sleepy),
            },
            dim_step: self.node.dim_step,
            dim_transition_time: self.node.dim_transition_time,
        })
    }
}

/// The `[node]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// "coordinator", "router" or "end_device".
    #[serde(default = "default_role")]
    pub role: String,
    /// Whether the node discovers a light and controls it.
    #[serde(default = "default_true")]
    pub controller: bool,
    #[serde(default)]
    pub manual_steering: bool,
    /// 2.4 GHz channel the network forms on.
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default = "default_max_children")]
    pub max_children: u8,
    #[serde(default = "default_local_endpoint")]
    pub local_endpoint: u8,
    #[serde(default = "default_dim_step")]
    pub dim_step: u8,
    /// Tenths of a second.
    #[serde(default = "default_dim_transition_time")]
    pub dim_transition_time: u16,
}

fn default_role() -> String {
    "coordinator".to_string()
}

fn default_true() -> bool {
    true
}

fn default_channel() -> u8 {
    16
}

fn default_max_children() -> u8 {
    10
}

fn default_local_endpoint() -> u8 {
    1
}

fn default_dim_step() -> u8 {
    15
}

fn default_dim_transition_time() -> u16 {
    2
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            role: default_role(),
            controller: true,
            manual_steering: false,
            channel: default_channel(),
            max_children: default_max_children(),
            local_endpoint: default_local_endpoint(),
            dim_step: default_dim_step(),
            dim_transition_time: default_dim_transition_time(),
        }
    }
}

/// The `[timing]` section. Durations are in milliseconds unless named otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub retry_delay_ms: u64,
    pub discovery_start_delay_ms: u64,
    pub discovery_timeout_ms: u64,
    pub commissioning_window_secs: u64,
    pub long_press_ms: u64,
    pub button_short_poll_ms: u64,
    pub button_long_poll_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1_000,
            discovery_start_delay_ms: 2_000,
            discovery_timeout_ms: 5_000,
            commissioning_window_secs: 180,
            long_press_ms: 1_000,
            button_short_poll_ms: 50,
            button_long_poll_ms: 300,
        }
    }
}

/// The `[discovery]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub profile_id: u16,
    /// Input clusters the peer must serve.
    pub clusters: Vec<u16>,
    /// Which devices answer: "rx_on_when_idle", "routers", "all", or a hex address.
    pub target: String,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            profile_id: 0x0104,
            clusters: vec![0x0006, 0x0008],
            target: "rx_on_when_idle".to_string(),
        }
    }
}

/// The `[buttons]` section: board button ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ButtonsSection {
    pub retry: u8,
    pub light_on: u8,
    pub light_off: u8,
    pub sleepy: u8,
}

impl Default for ButtonsSection {
    fn default() -> Self {
        Self {
            retry: 0,
            light_off: 1,
            sleepy: 2,
            light_on: 3,
        }
    }
}

/// The `[pool]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub buffers: usize,
    pub buffer_size: usize,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            buffers: 16,
            buffer_size: 128,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[simulation]` section driving the simulated radio stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// Start without stored network credentials.
    pub factory_new: bool,
    /// Fail this many commissioning attempts before succeeding.
    pub steering_failures: u32,
    /// Chance that any further attempt fails.
    pub failure_probability: f64,
    /// Seed for the failure draws; random when absent.
    pub seed: Option<u64>,
    /// Delay between a request and the simulated stack's answer.
    pub latency_ms: u64,
    /// Hold the sleepy button while booting.
    pub sleepy_button_held: bool,
    /// A light that answers discovery queries.
    pub peer: Option<PeerSection>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            factory_new: true,
            steering_failures: 0,
            failure_probability: 0.0,
            seed: None,
            latency_ms: 100,
            sleepy_button_held: false,
            peer: Some(PeerSection::default()),
        }
    }
}

/// The `[simulation.peer]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeerSection {
    pub short_addr: u16,
    pub endpoint: u8,
    /// The peer stays silent for the first `respond_after_queries - 1` queries.
    pub respond_after_queries: u32,
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            short_addr: 0x6f1c,
            endpoint: 10,
            respond_after_queries: 1,
        }
    }
}

/// Parse a role string to a `NodeRole`.
pub fn parse_role(s: &str) -> Result<NodeRole, NodeError> {
    match s.to_lowercase().as_str() {
        "coordinator" | "zc" => Ok(NodeRole::Coordinator),
        "router" | "zr" => Ok(NodeRole::Router),
        "end_device" | "enddevice" | "zed" => Ok(NodeRole::EndDevice),
        other => Err(NodeError::Config(format!("unknown node role: {other}"))),
    }
}

/// Parse a discovery target: a named broadcast class or a hex short address.
pub fn parse_target(s: &str) -> Result<ShortAddr, NodeError> {
    match s.to_lowercase().as_str() {
        "rx_on_when_idle" | "rx-on-when-idle" => Ok(BROADCAST_RX_ON_WHEN_IDLE),
        "routers" => Ok(BROADCAST_ROUTERS),
        "all" => Ok(BROADCAST_ALL),
        other => {
            let digits = other.strip_prefix("0x").unwrap_or(other);
            u16::from_str_radix(digits, 16)
                .map(ShortAddr::new)
                .map_err(|e| NodeError::Config(format!("invalid discovery target '{s}': {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcomm_core::constants::{CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, HA_PROFILE_ID};

    #[test]
    fn parse_empty_toml() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.role, "coordinator");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pool.buffers, 16);
        assert!(config.simulation.factory_new);
    }

    #[test]
    fn empty_config_matches_engine_defaults() {
        let settings = NodeConfig::parse("").unwrap().settings().unwrap();
        assert_eq!(settings, NodeSettings::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[node]
role = "router"
controller = false
manual_steering = true
channel = 20
max_children = 4

[timing]
retry_delay_ms = 250
discovery_timeout_ms = 8000
commissioning_window_secs = 60

[discovery]
profile_id = 0x0104
clusters = [0x0006]
target = "0xfffc"

[buttons]
retry = 4
sleepy = 5

[pool]
buffers = 8
buffer_size = 64

[logging]
level = "debug"

[simulation]
factory_new = false
steering_failures = 2
failure_probability = 0.25
seed = 7
latency_ms = 5

[simulation.peer]
short_addr = 0x1234
endpoint = 3
respond_after_queries = 4
"#;
        let config = NodeConfig::parse(toml).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.role, NodeRole::Router);
        assert!(!settings.controller);
        assert!(settings.manual_steering);
        assert_eq!(settings.timing.retry_delay, Duration::from_millis(250));
        assert_eq!(settings.timing.discovery_timeout, Duration::from_secs(8));
        // unset fields keep their defaults
        assert_eq!(settings.timing.discovery_start_delay, Duration::from_secs(2));
        assert_eq!(settings.timing.commissioning_window, Duration::from_secs(60));
        assert_eq!(settings.discovery.profile, HA_PROFILE_ID);
        assert_eq!(settings.discovery.clusters, vec![CLUSTER_ON_OFF]);
        assert_eq!(settings.discovery.role_filter, BROADCAST_ROUTERS);
        assert_eq!(settings.buttons.retry, ButtonId(4));
        assert_eq!(settings.buttons.light_on, ButtonId(3));

        assert_eq!(config.node.channel, 20);
        assert_eq!(config.pool.buffer_size, 64);
        assert_eq!(config.simulation.seed, Some(7));
        let peer = config.simulation.peer.unwrap();
        assert_eq!(peer.short_addr, 0x1234);
        assert_eq!(peer.respond_after_queries, 4);
    }

    #[test]
    fn default_targets_on_off_and_level() {
        let settings = NodeConfig::default().settings().unwrap();
        assert_eq!(
            settings.discovery.clusters,
            vec![CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL]
        );
    }

    #[test]
    fn parse_role_variants() {
        assert_eq!(parse_role("Coordinator").unwrap(), NodeRole::Coordinator);
        assert_eq!(parse_role("zr").unwrap(), NodeRole::Router);
        assert_eq!(parse_role("end_device").unwrap(), NodeRole::EndDevice);
        assert!(parse_role("repeater").is_err());
    }

    #[test]
    fn parse_target_variants() {
        assert_eq!(parse_target("all").unwrap(), BROADCAST_ALL);
        assert_eq!(parse_target("rx-on-when-idle").unwrap(), BROADCAST_RX_ON_WHEN_IDLE);
        assert_eq!(parse_target("0x1a2b").unwrap(), ShortAddr::new(0x1a2b));
        assert!(parse_target("everyone").is_err());
    }

    #[test]
    fn test_parse_malformed_toml() {
        let err = NodeConfig::parse("[node\nrole = ").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_parse_wrong_field_types() {
        assert!(NodeConfig::parse("[node]\ncontroller = \"yes\"\n").is_err());
        assert!(NodeConfig::parse("[pool]\nbuffers = -1\n").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(NodeConfig::parse("[node]\nchannel = 30\n").is_err());
        assert!(NodeConfig::parse("[pool]\nbuffers = 0\n").is_err());
        assert!(NodeConfig::parse("[pool]\nbuffers = 300\n").is_err());
        assert!(NodeConfig::parse("[simulation]\nfailure_probability = 1.5\n").is_err());
        assert!(NodeConfig::parse("[discovery]\nclusters = []\n").is_err());
        assert!(NodeConfig::parse("[node]\nrole = \"hub\"\n").is_err());
    }

    #[test]
    fn load_missing_file() {
        let err = NodeConfig::load(Path::new("/nonexistent/meshcomm.toml")).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
