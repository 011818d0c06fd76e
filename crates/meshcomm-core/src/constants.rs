//! Protocol constants for the home-automation profile and its stack.

use crate::types::{ClusterId, ProfileId, ShortAddr};

/// Home Automation application profile.
pub const HA_PROFILE_ID: ProfileId = ProfileId(0x0104);

/// ZDO profile, used for device discovery traffic.
pub const ZDO_PROFILE_ID: ProfileId = ProfileId(0x0000);

// Cluster identifiers
pub const CLUSTER_BASIC: ClusterId = ClusterId(0x0000);
pub const CLUSTER_IDENTIFY: ClusterId = ClusterId(0x0003);
pub const CLUSTER_ON_OFF: ClusterId = ClusterId(0x0006);
pub const CLUSTER_LEVEL_CONTROL: ClusterId = ClusterId(0x0008);

// ZDO cluster identifiers
pub const ZDO_MATCH_DESC_REQ: ClusterId = ClusterId(0x0006);
pub const ZDO_MATCH_DESC_RSP: ClusterId = ClusterId(0x8006);

// Network addresses
pub const COORDINATOR_ADDR: ShortAddr = ShortAddr(0x0000);
/// All devices in the PAN.
pub const BROADCAST_ALL: ShortAddr = ShortAddr(0xFFFF);
/// All devices with the receiver on when idle (non-sleepy devices).
pub const BROADCAST_RX_ON_WHEN_IDLE: ShortAddr = ShortAddr(0xFFFD);
/// All routers and the coordinator.
pub const BROADCAST_ROUTERS: ShortAddr = ShortAddr(0xFFFC);

// ZDP status codes
pub const ZDP_STATUS_SUCCESS: u8 = 0x00;
pub const ZDP_STATUS_INV_REQUESTTYPE: u8 = 0x80;
pub const ZDP_STATUS_DEVICE_NOT_FOUND: u8 = 0x81;
pub const ZDP_STATUS_TIMEOUT: u8 = 0x85;

// Stack return codes
pub const RET_OK: i32 = 0;
pub const RET_ERROR: i32 = -1;

// ZCL frame control: cluster-specific command, client to server, no default response.
pub const ZCL_FRAME_CLUSTER_SPECIFIC: u8 = 0x01;
pub const ZCL_FRAME_DISABLE_DEFAULT_RESPONSE: u8 = 0x10;

// ZCL command identifiers
pub const ZCL_CMD_OFF: u8 = 0x00;
pub const ZCL_CMD_ON: u8 = 0x01;
pub const ZCL_CMD_TOGGLE: u8 = 0x02;
pub const ZCL_CMD_LEVEL_STEP: u8 = 0x02;

// Frame sizes
pub const ZCL_HEADER_SIZE: usize = 3;
pub const MATCH_DESC_RSP_HEADER_SIZE: usize = 6;
pub const LEAVE_PARAMS_SIZE: usize = 9;
pub const DEVICE_ANNCE_PARAMS_SIZE: usize = 11;
pub const CAN_SLEEP_PARAMS_SIZE: usize = 4;
