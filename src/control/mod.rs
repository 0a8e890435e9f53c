//! # Control Module
//!
//! Receiving-side path from validated frames to actuator commands.

pub mod actuator;
pub mod adapter;
pub mod targets;
