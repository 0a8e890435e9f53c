//! # Telemetry Frame Constants and Types
//!
//! Core protocol definitions for glove telemetry frames.
//!
//! ```text
//! [seq:1][joint0:1][joint1:1][joint2:1][joint3:1][checksum:1]
//! ```

use super::checksum::xor_checksum;

/// Total frame size in bytes
pub const FRAME_LEN: usize = 6;

/// Number of bytes covered by the checksum (sequence + joint angles)
pub const FRAME_BODY_LEN: usize = FRAME_LEN - 1;

/// Index of the checksum byte
pub const CHECKSUM_INDEX: usize = FRAME_LEN - 1;

/// Number of joint angles carried per frame
pub const NUM_JOINTS: usize = 4;

/// Normalized angle range (8-bit: 0-255)
pub const ANGLE_MIN: NormalizedAngle = 0;
pub const ANGLE_MAX: NormalizedAngle = 255;

/// Mid-scale angle, used when a calibration range is degenerate
pub const ANGLE_MID: NormalizedAngle = 128;

/// Physical angle span represented by the normalized scale, in degrees
pub const ANGLE_SPAN_DEG: u16 = 180;

/// Joint angle mapped from 0-180 degrees onto 0-255
pub type NormalizedAngle = u8;

/// One normalized angle per finger joint
pub type JointAngles = [NormalizedAngle; NUM_JOINTS];

/// Encoded frame bytes
pub type FrameBytes = [u8; FRAME_LEN];

/// Joint indices in frame order.
pub mod joints {
    /// Metacarpophalangeal (knuckle)
    pub const MCP: usize = 0;
    /// Proximal interphalangeal
    pub const PIP: usize = 1;
    /// Distal interphalangeal
    pub const DIP: usize = 2;
    /// Fingertip
    pub const TIP: usize = 3;
}

/// Decoded telemetry frame
///
/// The checksum is derived from the other fields rather than stored, so a
/// `Frame` value always satisfies the checksum invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number, wraps modulo 256 and may skip values
    pub sequence: u8,

    /// Joint angles in frame order (MCP, PIP, DIP, TIP)
    pub angles: JointAngles,
}

impl Frame {
    /// Create a new frame
    pub fn new(sequence: u8, angles: JointAngles) -> Self {
        Self { sequence, angles }
    }

    /// Checksum byte for this frame (XOR of sequence and all angles)
    pub fn checksum(&self) -> u8 {
        self.sequence ^ xor_checksum(&self.angles)
    }
}
