//! # Error Types
//!
//! Custom error types for Glove Link using `thiserror`.

use thiserror::Error;

/// Frame validation failures reported by the packet decoder.
///
/// Both variants are expected on a noisy radio link. The receiving side drops
/// the offending frame and waits for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than a complete frame
    #[error("Short frame: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },

    /// Trailing byte does not match the XOR of the preceding bytes
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Main error type for Glove Link
#[derive(Debug, Error)]
pub enum GloveLinkError {
    /// Telemetry frame decoding errors
    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Calibration captured a flex reading that is not above the rest reading
    #[error("Degenerate calibration on axis {axis}: flex reading {high} must exceed rest reading {low}")]
    DegenerateCalibration { axis: usize, low: u16, high: u16 },

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Link lifecycle errors (connect failures, lost links)
    #[error("Link error: {0}")]
    Link(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry record serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Glove Link
pub type Result<T> = std::result::Result<T, GloveLinkError>;
