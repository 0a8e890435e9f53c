//! # Link Module
//!
//! Connection lifecycle and byte transport between the glove and the hand.
//!
//! - [`state`]: pure link state machine for the receiving role
//! - [`port_trait`]: byte-port abstraction used by the transport and tests
//! - [`serial`]: serial-stream transport driving the state machine

pub mod port_trait;
pub mod serial;
pub mod state;
