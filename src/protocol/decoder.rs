//! # Telemetry Frame Decoder
//!
//! Validates and decodes frames received from the link.

use super::checksum::xor_checksum;
use super::frame::*;
use crate::error::DecodeError;

/// Decode a telemetry frame
///
/// Only the first [`FRAME_LEN`] bytes are examined; any trailing bytes in a
/// longer notification are ignored.
///
/// # Arguments
///
/// * `bytes` - Frame bytes (sequence, 4 joint angles, checksum)
///
/// # Returns
///
/// * `Result<Frame, DecodeError>` - Decoded frame, or error if invalid
///
/// # Errors
///
/// Returns error if:
/// - Fewer than 6 bytes are supplied (`ShortFrame`)
/// - The checksum byte does not match (`ChecksumMismatch`)
///
/// A failed decode yields no partial data; the caller must drop the frame.
///
/// # Examples
///
/// ```
/// use glove_link::protocol::decoder::decode_frame;
///
/// let frame = decode_frame(&[5, 10, 20, 30, 40, 45]).unwrap();
/// assert_eq!(frame.sequence, 5);
/// assert_eq!(frame.angles, [10, 20, 30, 40]);
/// ```
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.len() < FRAME_LEN {
        return Err(DecodeError::ShortFrame {
            expected: FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let calculated = xor_checksum(&bytes[..FRAME_BODY_LEN]);
    let received = bytes[CHECKSUM_INDEX];

    if calculated != received {
        return Err(DecodeError::ChecksumMismatch {
            expected: calculated,
            actual: received,
        });
    }

    Ok(Frame {
        sequence: bytes[0],
        angles: [bytes[1], bytes[2], bytes[3], bytes[4]],
    })
}
