//! # XOR Checksum
//!
//! Single-byte integrity check for telemetry frames. Detects accidental
//! corruption only; it is not cryptographic.

/// Calculate the XOR of all bytes
///
/// # Arguments
///
/// * `data` - Byte slice to fold (sequence + joint angles for a frame)
///
/// # Returns
///
/// * `u8` - XOR of every byte, `0x00` for an empty slice
///
/// # Examples
///
/// ```
/// use glove_link::protocol::checksum::xor_checksum;
///
/// assert_eq!(xor_checksum(&[5, 10, 20, 30, 40]), 45);
/// ```
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Check that the last byte of `data` is the XOR of the bytes before it
///
/// Returns `false` for an empty slice.
pub fn verify_trailing_checksum(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&checksum, body)) => xor_checksum(body) == checksum,
        None => false,
    }
}
