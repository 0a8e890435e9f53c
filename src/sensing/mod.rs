//! # Sensing Module
//!
//! Glove-side pipeline from flex sensors to outgoing telemetry frames.
//!
//! This module handles:
//! - Sampling raw flex sensor readings
//! - Mapping readings to normalized joint angles through calibration ranges
//! - Interactive two-pose calibration
//! - Pacing frame transmission

pub mod calibration;
pub mod scheduler;
pub mod sensor;
