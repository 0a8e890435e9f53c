//! # Transmit Scheduler
//!
//! Paces outgoing telemetry frames on the glove side.
//!
//! The scheduler emits at most one frame per interval and only while a peer
//! is connected. Every emitted frame consumes one sequence number, whether
//! or not the link manages to deliver it.
//!
//! Transmit slots are phase-locked: a frame sent a little late does not
//! push the next slot back, so wake-up jitter in the caller's loop cannot
//! halve the rate. After a gap of two intervals or more (peer away, loop
//! stalled) the grid restarts at the current time instead of bursting.

use std::time::{Duration, Instant};

use crate::protocol::encoder::encode_frame;
use crate::protocol::frame::{FrameBytes, JointAngles};

/// Default transmit interval (~30 Hz)
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_millis(33);

/// Fixed-cadence frame scheduler.
#[derive(Debug, Clone)]
pub struct TransmitScheduler {
    interval: Duration,
    last_transmit: Option<Instant>,
    sequence: u8,
}

impl Default for TransmitScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TX_INTERVAL)
    }
}

impl TransmitScheduler {
    /// Creates a scheduler with the given minimum spacing between frames
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_transmit: None,
            sequence: 0,
        }
    }

    /// Minimum spacing between frames
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sequence number the next frame will carry
    #[must_use]
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }

    /// Returns true if a frame would be emitted at `now`
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_transmit {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    fn next_slot(&self, now: Instant) -> Instant {
        match self.last_transmit {
            Some(last) if now.saturating_duration_since(last) < self.interval * 2 => {
                last + self.interval
            }
            _ => now,
        }
    }

    /// Advances the scheduler by one loop iteration.
    ///
    /// # Arguments
    ///
    /// * `now` - Current time
    /// * `peer_connected` - Whether a receiver is currently connected
    /// * `sample` - Produces the joint angles; only called when a frame is emitted
    ///
    /// # Returns
    ///
    /// * `Option<FrameBytes>` - Encoded frame to hand to the link, if one is due
    pub fn tick<F>(&mut self, now: Instant, peer_connected: bool, sample: F) -> Option<FrameBytes>
    where
        F: FnOnce() -> JointAngles,
    {
        if !peer_connected || !self.is_due(now) {
            return None;
        }

        let frame = encode_frame(self.sequence, &sample());
        self.sequence = self.sequence.wrapping_add(1);
        self.last_transmit = Some(self.next_slot(now));

        Some(frame)
    }
}
