use thiserror::Error;

use crate::controller::{clamp_accelerator, clamp_axis, CommandFlags, ControlState};

pub const PACKET_SIZE: usize = 9;
pub const PACKET_HEADER: [u8; 2] = [0x03, 0x66];
pub const PACKET_FOOTER: u8 = 0x99;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("control packet must be 9 bytes, got {0}")]
    InvalidLength(usize),
    #[error("bad packet framing (header {header:02x?}, footer {footer:#04x})")]
    BadFraming { header: [u8; 2], footer: u8 },
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Layout on the wire:
/// `[0x03, 0x66, roll, pitch, accelerator, turn, flags, checksum, 0x99]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPacket {
    pub roll: u8,
    pub pitch: u8,
    pub accelerator: u8,
    pub turn: u8,
    pub flags: CommandFlags,
}

impl ControlPacket {
    /// Builds a packet from a state snapshot. Axes are clamped on the way in,
    /// the snapshot itself is left alone.
    pub fn from_state(state: &ControlState) -> Self {
        ControlPacket {
            roll: clamp_axis(state.axes.roll) as u8,
            pitch: clamp_axis(state.axes.pitch) as u8,
            accelerator: clamp_accelerator(state.axes.accelerator) as u8,
            turn: clamp_axis(state.axes.turn) as u8,
            flags: state.flags,
        }
    }

    pub fn checksum(&self) -> u8 {
        self.roll ^ self.pitch ^ self.accelerator ^ self.turn ^ self.flags.wire_byte()
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        [
            PACKET_HEADER[0],
            PACKET_HEADER[1],
            self.roll,
            self.pitch,
            self.accelerator,
            self.turn,
            self.flags.wire_byte(),
            self.checksum(),
            PACKET_FOOTER,
        ]
    }

    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let bytes: &[u8; PACKET_SIZE] = data
            .try_into()
            .map_err(|_| PacketError::InvalidLength(data.len()))?;

        let header = [bytes[0], bytes[1]];
        if header != PACKET_HEADER || bytes[8] != PACKET_FOOTER {
            return Err(PacketError::BadFraming {
                header,
                footer: bytes[8],
            });
        }

        let packet = ControlPacket {
            roll: bytes[2],
            pitch: bytes[3],
            accelerator: bytes[4],
            turn: bytes[5],
            flags: CommandFlags::from(bytes[6]),
        };
        let expected = packet.roll ^ packet.pitch ^ packet.accelerator ^ packet.turn ^ bytes[6];
        if expected != bytes[7] {
            return Err(PacketError::ChecksumMismatch {
                expected,
                actual: bytes[7],
            });
        }
        Ok(packet)
    }
}
