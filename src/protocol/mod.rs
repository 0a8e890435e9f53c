//! # Telemetry Protocol Module
//!
//! Implementation of the glove-to-hand telemetry wire format.
//!
//! This module handles:
//! - Fixed 6-byte frame layout (sequence + 4 joint angles + checksum)
//! - Frame encoding on the glove side
//! - Frame decoding and validation on the hand side
//! - XOR checksum calculation
//! - Frame resynchronization on raw byte streams

pub mod frame;
pub mod encoder;
pub mod decoder;
pub mod checksum;
pub mod stream;
