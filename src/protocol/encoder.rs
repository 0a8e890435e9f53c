//! # Telemetry Frame Encoder
//!
//! Encodes a sequence number and joint angles into a wire frame.

use super::checksum::xor_checksum;
use super::frame::*;

/// Encode a sequence number and joint angles into a complete frame
///
/// # Arguments
///
/// * `sequence` - Frame sequence number (wraps at 256)
/// * `angles` - Four normalized joint angles (MCP, PIP, DIP, TIP)
///
/// # Returns
///
/// * `FrameBytes` - 6-byte frame: sequence + 4 angles + checksum
///
/// # Examples
///
/// ```
/// use glove_link::protocol::encoder::encode_frame;
///
/// let frame = encode_frame(5, &[10, 20, 30, 40]);
/// assert_eq!(frame, [5, 10, 20, 30, 40, 45]);
/// ```
pub fn encode_frame(sequence: u8, angles: &JointAngles) -> FrameBytes {
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = sequence;
    bytes[1..CHECKSUM_INDEX].copy_from_slice(angles);
    bytes[CHECKSUM_INDEX] = xor_checksum(&bytes[..FRAME_BODY_LEN]);
    bytes
}

impl Frame {
    /// Encode this frame into wire bytes
    pub fn encode(&self) -> FrameBytes {
        encode_frame(self.sequence, &self.angles)
    }
}
