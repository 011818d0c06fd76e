//! Cluster command frames sent to a discovered peer.
//!
//! Only the client-to-server commands a dimmer switch needs are modelled:
//! On/Off/Toggle on the On/Off cluster and Step on the Level Control cluster.
//!
//! Frame layout: `frame_control(1) seq(1) command(1) payload`.
//! Step payload: `mode(1) step_size(1) transition_time(2)`.

use crate::constants::{
    CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, ZCL_CMD_LEVEL_STEP, ZCL_CMD_OFF, ZCL_CMD_ON,
    ZCL_CMD_TOGGLE, ZCL_FRAME_CLUSTER_SPECIFIC, ZCL_FRAME_DISABLE_DEFAULT_RESPONSE,
    ZCL_HEADER_SIZE,
};
use crate::error::{CodecError, PayloadError};
use crate::types::ClusterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepMode {
    Up = 0x00,
    Down = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZclCommand {
    On,
    Off,
    Toggle,
    /// `transition_time` is in tenths of a second; 0xFFFF means "as fast as possible".
    LevelStep {
        mode: StepMode,
        step_size: u8,
        transition_time: u16,
    },
}

impl ZclCommand {
    pub fn cluster(&self) -> ClusterId {
        match self {
            ZclCommand::On | ZclCommand::Off | ZclCommand::Toggle => CLUSTER_ON_OFF,
            ZclCommand::LevelStep { .. } => CLUSTER_LEVEL_CONTROL,
        }
    }

    pub fn command_id(&self) -> u8 {
        match self {
            ZclCommand::On => ZCL_CMD_ON,
            ZclCommand::Off => ZCL_CMD_OFF,
            ZclCommand::Toggle => ZCL_CMD_TOGGLE,
            ZclCommand::LevelStep { .. } => ZCL_CMD_LEVEL_STEP,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            ZclCommand::LevelStep { .. } => ZCL_HEADER_SIZE + 4,
            _ => ZCL_HEADER_SIZE,
        }
    }

    /// Write the command frame into `out` with transaction sequence `seq`.
    pub fn encode_into(&self, seq: u8, out: &mut [u8]) -> Result<usize, CodecError> {
        let needed = self.encoded_len();
        if out.len() < needed {
            return Err(CodecError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }
        out[0] = ZCL_FRAME_CLUSTER_SPECIFIC | ZCL_FRAME_DISABLE_DEFAULT_RESPONSE;
        out[1] = seq;
        out[2] = self.command_id();
        if let ZclCommand::LevelStep {
            mode,
            step_size,
            transition_time,
        } = self
        {
            out[3] = *mode as u8;
            out[4] = *step_size;
            out[5..7].copy_from_slice(&transition_time.to_le_bytes());
        }
        Ok(needed)
    }

    /// Parse a frame received on `cluster`. Returns the sequence number and command.
    pub fn decode(cluster: ClusterId, data: &[u8]) -> Result<(u8, Self), PayloadError> {
        if data.len() < ZCL_HEADER_SIZE {
            return Err(PayloadError::TooShort {
                min: ZCL_HEADER_SIZE,
                actual: data.len(),
            });
        }
        let seq = data[1];
        let command = match (cluster, data[2]) {
            (c, ZCL_CMD_ON) if c == CLUSTER_ON_OFF => ZclCommand::On,
            (c, ZCL_CMD_OFF) if c == CLUSTER_ON_OFF => ZclCommand::Off,
            (c, ZCL_CMD_TOGGLE) if c == CLUSTER_ON_OFF => ZclCommand::Toggle,
            (c, ZCL_CMD_LEVEL_STEP) if c == CLUSTER_LEVEL_CONTROL => {
                let body = data.get(3..7).ok_or(PayloadError::TooShort {
                    min: 7,
                    actual: data.len(),
                })?;
                ZclCommand::LevelStep {
                    mode: if body[0] == StepMode::Down as u8 {
                        StepMode::Down
                    } else {
                        StepMode::Up
                    },
                    step_size: body[1],
                    transition_time: u16::from_le_bytes([body[2], body[3]]),
                }
            }
            (c, other) => {
                return Err(PayloadError::UnknownCommand {
                    cluster: c.get(),
                    command: other,
                });
            }
        };
        Ok((seq, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_frame() {
        let mut out = [0u8; 8];
        let n = ZclCommand::On.encode_into(7, &mut out).unwrap();
        assert_eq!(&out[..n], &[0x11, 7, 0x01]);
        assert_eq!(ZclCommand::On.cluster(), CLUSTER_ON_OFF);
    }

    #[test]
    fn step_frame() {
        let cmd = ZclCommand::LevelStep {
            mode: StepMode::Down,
            step_size: 15,
            transition_time: 2,
        };
        let mut out = [0u8; 8];
        let n = cmd.encode_into(0x42, &mut out).unwrap();
        assert_eq!(&out[..n], &[0x11, 0x42, 0x02, 0x01, 15, 2, 0]);
        assert_eq!(cmd.cluster(), CLUSTER_LEVEL_CONTROL);
        assert_eq!(ZclCommand::decode(CLUSTER_LEVEL_CONTROL, &out[..n]).unwrap(), (0x42, cmd));
    }

    #[test]
    fn step_needs_room() {
        let cmd = ZclCommand::LevelStep {
            mode: StepMode::Up,
            step_size: 1,
            transition_time: 0,
        };
        assert_eq!(
            cmd.encode_into(0, &mut [0u8; 3]),
            Err(CodecError::BufferTooSmall {
                needed: 7,
                available: 3
            })
        );
    }

    #[test]
    fn decode_off() {
        assert_eq!(
            ZclCommand::decode(CLUSTER_ON_OFF, &[0x11, 3, 0x00]).unwrap(),
            (3, ZclCommand::Off)
        );
    }
}
