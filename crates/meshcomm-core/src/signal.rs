//! Stack signal tags and payload decoding.
//!
//! The stack reports every network-level event through a single callback
//! carrying a numeric tag, a status code, and a buffer whose payload holds
//! the event parameters. [`Signal::decode`] turns the tag and payload into
//! a typed event.
//!
//! Payload layouts (little endian):
//!
//! ```text
//! LEAVE             ieee(8) leave_type(1)
//! DEVICE_ANNCE      short_addr(2) ieee(8) capabilities(1)
//! CAN_SLEEP         sleep_ms(4)
//! MATCH_DESC_RSP    src_addr(2) status(1) addr_of_interest(2) match_len(1) endpoints(n)
//! ```
//!
//! All other tags carry no payload.

use crate::constants::{CAN_SLEEP_PARAMS_SIZE, DEVICE_ANNCE_PARAMS_SIZE, LEAVE_PARAMS_SIZE};
use crate::error::PayloadError;
use crate::types::{IeeeAddr, ShortAddr, Status};
use crate::zdo::MatchDescResponse;

/// Numeric signal tags as delivered by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SignalTag {
    SkipStartup = 1,
    DeviceAnnounce = 2,
    Leave = 3,
    DeviceFirstStart = 5,
    DeviceReboot = 6,
    Steering = 10,
    Formation = 11,
    CanSleep = 22,
    ProductionConfigReady = 23,
    MatchDescResponse = 0x8006,
}

impl SignalTag {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(SignalTag::SkipStartup),
            2 => Some(SignalTag::DeviceAnnounce),
            3 => Some(SignalTag::Leave),
            5 => Some(SignalTag::DeviceFirstStart),
            6 => Some(SignalTag::DeviceReboot),
            10 => Some(SignalTag::Steering),
            11 => Some(SignalTag::Formation),
            22 => Some(SignalTag::CanSleep),
            23 => Some(SignalTag::ProductionConfigReady),
            0x8006 => Some(SignalTag::MatchDescResponse),
            _ => None,
        }
    }

    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Why the node left the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeaveType {
    /// Network state was wiped; the stack will not try to come back on its own.
    Reset = 0,
    /// The stack rejoins by itself after leaving.
    Rejoin = 1,
}

impl LeaveType {
    pub fn from_u8(v: u8) -> Result<Self, PayloadError> {
        match v {
            0 => Ok(LeaveType::Reset),
            1 => Ok(LeaveType::Rejoin),
            _ => Err(PayloadError::InvalidLeaveType(v)),
        }
    }

    /// Whether the application has to restart commissioning to get back on a network.
    pub const fn requires_rejoin(self) -> bool {
        matches!(self, LeaveType::Reset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveParams {
    pub device: IeeeAddr,
    pub leave_type: LeaveType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAnnounce {
    pub short_addr: ShortAddr,
    pub ieee_addr: IeeeAddr,
    pub capabilities: u8,
}

/// A decoded stack signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The stack is up and waiting for the application to start commissioning.
    SkipStartup,
    DeviceAnnounce(DeviceAnnounce),
    /// `None` when the leave itself failed (non-OK status, no parameters).
    Leave(Option<LeaveParams>),
    DeviceFirstStart,
    DeviceReboot,
    Steering,
    Formation,
    CanSleep { sleep_ms: u32 },
    ProductionConfigReady,
    MatchDescResponse(MatchDescResponse),
    Unknown(u16),
}

impl Signal {
    /// Decode a signal from its tag, status and buffer payload.
    ///
    /// Tags without a payload ignore `payload`. A leave signal with a
    /// failure status carries no parameters.
    pub fn decode(tag: u16, status: Status, payload: &[u8]) -> Result<Self, PayloadError> {
        let Some(tag) = SignalTag::from_u16(tag) else {
            return Ok(Signal::Unknown(tag));
        };

        let signal = match tag {
            SignalTag::SkipStartup => Signal::SkipStartup,
            SignalTag::DeviceFirstStart => Signal::DeviceFirstStart,
            SignalTag::DeviceReboot => Signal::DeviceReboot,
            SignalTag::Steering => Signal::Steering,
            SignalTag::Formation => Signal::Formation,
            SignalTag::ProductionConfigReady => Signal::ProductionConfigReady,
            SignalTag::Leave => {
                if status.is_ok() {
                    Signal::Leave(Some(decode_leave(payload)?))
                } else {
                    Signal::Leave(None)
                }
            }
            SignalTag::DeviceAnnounce => Signal::DeviceAnnounce(decode_device_announce(payload)?),
            SignalTag::CanSleep => {
                let bytes = take::<CAN_SLEEP_PARAMS_SIZE>(payload)?;
                Signal::CanSleep {
                    sleep_ms: u32::from_le_bytes(bytes),
                }
            }
            SignalTag::MatchDescResponse => {
                Signal::MatchDescResponse(MatchDescResponse::decode(payload)?)
            }
        };
        Ok(signal)
    }

    /// The numeric tag this signal was decoded from.
    pub fn tag(&self) -> u16 {
        match self {
            Signal::SkipStartup => SignalTag::SkipStartup.to_u16(),
            Signal::DeviceAnnounce(_) => SignalTag::DeviceAnnounce.to_u16(),
            Signal::Leave(_) => SignalTag::Leave.to_u16(),
            Signal::DeviceFirstStart => SignalTag::DeviceFirstStart.to_u16(),
            Signal::DeviceReboot => SignalTag::DeviceReboot.to_u16(),
            Signal::Steering => SignalTag::Steering.to_u16(),
            Signal::Formation => SignalTag::Formation.to_u16(),
            Signal::CanSleep { .. } => SignalTag::CanSleep.to_u16(),
            Signal::ProductionConfigReady => SignalTag::ProductionConfigReady.to_u16(),
            Signal::MatchDescResponse(_) => SignalTag::MatchDescResponse.to_u16(),
            Signal::Unknown(tag) => *tag,
        }
    }
}

fn take<const N: usize>(payload: &[u8]) -> Result<[u8; N], PayloadError> {
    payload
        .get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or(PayloadError::TooShort {
            min: N,
            actual: payload.len(),
        })
}

fn decode_leave(payload: &[u8]) -> Result<LeaveParams, PayloadError> {
    let bytes = take::<LEAVE_PARAMS_SIZE>(payload)?;
    let mut ieee = [0u8; 8];
    ieee.copy_from_slice(&bytes[..8]);
    Ok(LeaveParams {
        device: IeeeAddr::new(ieee),
        leave_type: LeaveType::from_u8(bytes[8])?,
    })
}

fn decode_device_announce(payload: &[u8]) -> Result<DeviceAnnounce, PayloadError> {
    let bytes = take::<DEVICE_ANNCE_PARAMS_SIZE>(payload)?;
    let mut ieee = [0u8; 8];
    ieee.copy_from_slice(&bytes[2..10]);
    Ok(DeviceAnnounce {
        short_addr: ShortAddr::from_le_bytes([bytes[0], bytes[1]]),
        ieee_addr: IeeeAddr::new(ieee),
        capabilities: bytes[10],
    })
}

/// Encode leave parameters as the stack lays them out in the signal buffer.
pub fn encode_leave(params: &LeaveParams) -> [u8; LEAVE_PARAMS_SIZE] {
    let mut out = [0u8; LEAVE_PARAMS_SIZE];
    out[..8].copy_from_slice(params.device.as_ref());
    out[8] = params.leave_type as u8;
    out
}

/// Encode device-announce parameters as the stack lays them out.
pub fn encode_device_announce(params: &DeviceAnnounce) -> [u8; DEVICE_ANNCE_PARAMS_SIZE] {
    let mut out = [0u8; DEVICE_ANNCE_PARAMS_SIZE];
    out[..2].copy_from_slice(&params.short_addr.to_le_bytes());
    out[2..10].copy_from_slice(params.ieee_addr.as_ref());
    out[10] = params.capabilities;
    out
}
