//! The 5-byte desk protocol frame.
//!
//! Wire format:
//! ```text
//! [header:1][payload:3][checksum:1]
//! ```
//! `checksum` is the wrapping sum of the three payload bytes.

use std::fmt;

/// Header of frames sent by the handset to the controller.
pub const HANDSET_HEADER: u8 = 0xA5;

/// Header of frames sent by the controller to the handset.
pub const CONTROLLER_HEADER: u8 = 0x5A;

/// Total frame size in bytes.
pub const FRAME_LEN: usize = 5;

/// Wrapping sum of `bytes`, the protocol checksum rule.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// One complete protocol frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Wraps five raw bytes without validating them.
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a frame from a header and payload, computing the checksum.
    pub fn with_payload(header: u8, payload: [u8; 3]) -> Self {
        Self([header, payload[0], payload[1], payload[2], checksum(&payload)])
    }

    /// Copies a slice into a frame; returns `None` unless it is exactly
    /// [`FRAME_LEN`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; FRAME_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub const fn header(&self) -> u8 {
        self.0[0]
    }

    /// The three payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.0[1..4]
    }

    /// Payload plus checksum: the 4-byte body the codec decodes.
    pub fn body(&self) -> &[u8] {
        &self.0[1..]
    }

    pub const fn checksum(&self) -> u8 {
        self.0[4]
    }

    /// Returns `true` when the checksum byte matches the payload.
    pub fn is_checksum_valid(&self) -> bool {
        checksum(self.payload()) == self.checksum()
    }

    /// The raw bytes, ready to write to a serial line.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({self})")
    }
}

impl fmt::Display for Frame {
    /// Lowercase hex without separators, the format used in bridge logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps_modulo_256() {
        assert_eq!(checksum(&[0xFF, 0x02, 0x00]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_with_payload_sets_checksum() {
        let frame = Frame::with_payload(CONTROLLER_HEADER, [0x06, 0x5B, 0x4F]);
        assert_eq!(frame.checksum(), 0x06 + 0x5B + 0x4F);
        assert!(frame.is_checksum_valid());
    }

    #[test]
    fn test_corrupted_checksum_detected() {
        let frame = Frame::from_bytes([HANDSET_HEADER, 0x01, 0x00, 0x00, 0x02]);
        assert!(!frame.is_checksum_valid());
    }

    #[test]
    fn test_from_slice_requires_exact_length() {
        assert!(Frame::from_slice(&[0xA5, 0, 0, 0]).is_none());
        assert!(Frame::from_slice(&[0xA5, 0, 0, 0, 0, 0]).is_none());
        assert!(Frame::from_slice(&[0xA5, 0, 0, 0, 0]).is_some());
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let frame = Frame::from_bytes([0xA5, 0x00, 0x60, 0x9F, 0xFF]);
        assert_eq!(frame.to_string(), "a500609fff");
    }

    #[test]
    fn test_body_is_payload_plus_checksum() {
        let frame = Frame::from_bytes([0x5A, 1, 2, 3, 6]);
        assert_eq!(frame.body(), &[1, 2, 3, 6]);
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }
}
