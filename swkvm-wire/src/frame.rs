//! Wire frame: the fixed 16-byte event record shared by the controller and peer.

use thiserror::Error;

/// Plaintext size of one event frame: four 32-bit fields, no padding.
pub const FRAME_LEN: usize = 16;

/// Errors decoding a wire frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is {got} bytes, expected {FRAME_LEN}")]
    WrongLength { got: usize },
}

/// One input event on the wire: `{device_id, event_type, event_code, event_value}`.
///
/// `device_id` correlates a controller device with a peer's synthetic device.
/// `event_type`/`event_code` mirror the host input subsystem's type/code pair.
/// `event_value` is signed (key state 0/1/2, axis delta, scan code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub device_id: u32,
    pub event_type: u32,
    pub event_code: u32,
    pub event_value: i32,
}

impl Frame {
    /// A frame with every field zero. Flushes a logical event group on the peer.
    pub const fn sync(device_id: u32) -> Self {
        Frame {
            device_id,
            event_type: 0,
            event_code: 0,
            event_value: 0,
        }
    }

    /// True for a zero type/code/value frame, regardless of `device_id`.
    pub fn is_sync(&self) -> bool {
        self.event_type == 0 && self.event_code == 0 && self.event_value == 0
    }

    /// Serialize to 16 bytes, network byte order.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0..4].copy_from_slice(&self.device_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.event_type.to_be_bytes());
        buf[8..12].copy_from_slice(&self.event_code.to_be_bytes());
        buf[12..16].copy_from_slice(&self.event_value.to_be_bytes());
        buf
    }

    /// Decode 16 bytes of network-byte-order fields back into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::WrongLength { got: bytes.len() });
        }
        Ok(Frame {
            device_id: u32::from_be_bytes(bytes[0..4].try_into().unwrap()),
            event_type: u32::from_be_bytes(bytes[4..8].try_into().unwrap()),
            event_code: u32::from_be_bytes(bytes[8..12].try_into().unwrap()),
            event_value: i32::from_be_bytes(bytes[12..16].try_into().unwrap()),
        })
    }
}
