//! # Telemetry Module
//!
//! Link diagnostics for the receiving side.
//!
//! This module handles:
//! - Sequence number tracking with wrap-around
//! - Counting accepted and dropped frames
//! - Formatting status records as JSONL (JSON Lines)
//! - Writing to rotating log files
//! - Retaining only the last N files

pub mod logger;
pub mod stats;
