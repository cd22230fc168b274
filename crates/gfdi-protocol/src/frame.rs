//! Frame encoding/decoding.
//!
//! Every message travels in one frame:
//!
//! ```text
//! +-----------+-----------+-------------------+---------+
//! | len (u16) | type (u16)| payload           | crc u16 |
//! +-----------+-----------+-------------------+---------+
//! ```
//!
//! `len` counts every byte of the frame, itself included, so a frame with an
//! empty payload is 6 bytes long. The checksum covers everything before it.
//! Finding frame boundaries in a raw byte stream is the transport's job: the
//! codec works on one complete frame at a time.

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;

use crate::checksum::checksum;
use crate::constants::{DEFAULT_MAX_PACKET_SIZE, FRAME_OVERHEAD};
use crate::error::{EncodeError, FrameError};

/// A validated frame with its checksum stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type code.
    pub type_code: u16,
    /// Payload bytes, bounded to the payload region.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame.
    pub fn new(type_code: u16, payload: impl Into<Bytes>) -> Self {
        Frame {
            type_code,
            payload: payload.into(),
        }
    }
}

/// Encoder and validator for frames.
///
/// Holds the per-session maximum packet size; outbound frames larger than it
/// are refused. Inbound frames are accepted at any size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_packet_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl FrameCodec {
    /// Create a codec with the given maximum packet size.
    pub fn new(max_packet_size: u16) -> Self {
        FrameCodec {
            max_packet_size: max_packet_size as usize,
        }
    }

    /// Maximum size of an outbound frame.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Replace the maximum packet size, e.g. after the peer reports its own.
    pub fn set_max_packet_size(&mut self, max_packet_size: u16) {
        self.max_packet_size = max_packet_size as usize;
    }

    /// Largest payload that fits in one outbound frame.
    pub fn max_payload_size(&self) -> usize {
        self.max_packet_size.saturating_sub(FRAME_OVERHEAD)
    }

    /// Frame a payload.
    pub fn encode(&self, type_code: u16, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let size = payload.len() + FRAME_OVERHEAD;
        if size > self.max_packet_size || size > u16::MAX as usize {
            return Err(EncodeError::FrameTooLarge {
                size,
                max: self.max_packet_size.min(u16::MAX as usize),
            });
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.put_u16_le(0);
        buf.put_u16_le(type_code);
        buf.put_slice(payload);
        let total = (buf.len() + 2) as u16;
        buf[0..2].copy_from_slice(&total.to_le_bytes());
        let crc = checksum(&buf);
        buf.put_u16_le(crc);

        trace!("encoded frame type {} ({} bytes)", type_code, size);
        Ok(buf.to_vec())
    }

    /// Validate one complete inbound frame.
    ///
    /// Length is checked before the checksum so a truncated or padded buffer
    /// reports `LengthMismatch`.
    pub fn decode(&self, data: &[u8]) -> Result<Frame, FrameError> {
        if data.len() < 2 {
            return Err(FrameError::LengthMismatch {
                declared: None,
                actual: data.len(),
            });
        }

        let declared = u16::from_le_bytes([data[0], data[1]]);
        if declared as usize != data.len() {
            return Err(FrameError::LengthMismatch {
                declared: Some(declared),
                actual: data.len(),
            });
        }
        if data.len() < FRAME_OVERHEAD {
            return Err(FrameError::TooShort { actual: data.len() });
        }

        let body_end = data.len() - 2;
        let expected = checksum(&data[..body_end]);
        let actual = u16::from_le_bytes([data[body_end], data[body_end + 1]]);
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        let type_code = u16::from_le_bytes([data[2], data[3]]);
        Ok(Frame {
            type_code,
            payload: Bytes::copy_from_slice(&data[4..body_end]),
        })
    }
}
