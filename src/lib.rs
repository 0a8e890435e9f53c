//! # Glove Link Library
//!
//! Streams finger joint angles from a flex-sensor glove to a robotic hand.
//!
//! The glove samples its sensors, maps the raw readings through per-axis
//! calibration ranges and sends 6-byte frames at a fixed cadence. The hand
//! validates each frame, tracks the link lifecycle and keeps every joint
//! on its last good target when the link goes quiet.
//!
//! - [`protocol`]: frame layout, XOR checksum, encoder, decoder, stream reassembly
//! - [`sensing`]: flex sensors, calibration, transmit pacing
//! - [`link`]: link state machine and serial transport
//! - [`control`]: joint targets, control loop adapter, actuators
//! - [`telemetry`]: link statistics and JSONL logs
//! - [`runtime`]: glove and hand loops

pub mod config;
pub mod control;
pub mod error;
pub mod link;
pub mod protocol;
pub mod runtime;
pub mod sensing;
pub mod telemetry;
