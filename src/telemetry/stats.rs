//! # Link Statistics
//!
//! Receive-side counters and sequence tracking.
//!
//! Counters are purely diagnostic and never influence whether a frame is
//! applied.

use serde::Serialize;

use crate::error::DecodeError;

/// Tracks frame sequence numbers with wrap-around.
///
/// Sequence numbers are diagnostic only. Gaps are expected on a lossy link
/// and never cause a frame to be rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTracker {
    last: Option<u8>,
}

/// How a sequence number relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    /// First frame since the tracker was reset
    First,
    /// Advanced by `missed + 1`
    Advanced { missed: u8 },
    /// Same as, or behind, the previous sequence number
    Late,
}

impl SequenceTracker {
    /// Records a sequence number and classifies it.
    ///
    /// A forward distance of 1..=127 (mod 256) counts as progress; anything
    /// else is treated as a repeat or late arrival.
    pub fn record(&mut self, sequence: u8) -> SequenceStep {
        let step = match self.last {
            None => SequenceStep::First,
            Some(last) => {
                let distance = sequence.wrapping_sub(last);
                if (1..=127).contains(&distance) {
                    SequenceStep::Advanced { missed: distance - 1 }
                } else {
                    SequenceStep::Late
                }
            }
        };

        if step != SequenceStep::Late {
            self.last = Some(sequence);
        }
        step
    }

    /// Last sequence number that moved the tracker forward
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Forget history (called when the link drops)
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Running counters for the receiving link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub frames_accepted: u64,
    pub short_frames: u64,
    pub checksum_failures: u64,
    pub missed_sequences: u64,
    pub late_sequences: u64,
    pub link_losses: u64,
    pub connect_failures: u64,
    pub resync_bytes: u64,
}

impl LinkStats {
    /// Count an accepted frame
    pub fn record_accepted(&mut self, step: SequenceStep) {
        self.frames_accepted += 1;
        match step {
            SequenceStep::Advanced { missed } => self.missed_sequences += missed as u64,
            SequenceStep::Late => self.late_sequences += 1,
            SequenceStep::First => {}
        }
    }

    /// Count a dropped frame
    pub fn record_dropped(&mut self, error: &DecodeError) {
        match error {
            DecodeError::ShortFrame { .. } => self.short_frames += 1,
            DecodeError::ChecksumMismatch { .. } => self.checksum_failures += 1,
        }
    }

    /// Total frames dropped by validation
    pub fn frames_dropped(&self) -> u64 {
        self.short_frames + self.checksum_failures
    }
}
