//! # Joint Targets
//!
//! Latest joint targets received over the link.
//!
//! Each joint keeps the last accepted angle and a fresh flag. Link loss
//! leaves the angles in place so the hand holds its pose.

use std::time::Instant;

use crate::protocol::frame::{Frame, NormalizedAngle, NUM_JOINTS};
use crate::telemetry::stats::{SequenceStep, SequenceTracker};

/// Latest accepted angle for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTarget {
    pub angle: NormalizedAngle,
    /// Set when a frame updates the target, cleared when the control tick consumes it
    pub fresh: bool,
}

/// Joint targets shared between the link handler (producer) and the
/// control tick (consumer).
///
/// Targets survive link loss: only the sequence history is reset.
#[derive(Debug, Clone, Default)]
pub struct JointTargets {
    joints: [Option<JointTarget>; NUM_JOINTS],
    tracker: SequenceTracker,
    last_update: Option<Instant>,
}

impl JointTargets {
    /// Create targets with every joint unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a validated frame, marking every joint fresh
    ///
    /// The sequence number is recorded for diagnostics only; late or
    /// repeated frames are still applied.
    pub fn apply(&mut self, frame: &Frame, now: Instant) -> SequenceStep {
        for (slot, &angle) in self.joints.iter_mut().zip(frame.angles.iter()) {
            *slot = Some(JointTarget { angle, fresh: true });
        }
        self.last_update = Some(now);
        self.tracker.record(frame.sequence)
    }

    /// Current target of a joint, if any frame has set it
    pub fn get(&self, joint: usize) -> Option<JointTarget> {
        self.joints.get(joint).copied().flatten()
    }

    /// Return the angle if it is fresh, clearing the flag
    pub fn take_fresh(&mut self, joint: usize) -> Option<NormalizedAngle> {
        match self.joints.get_mut(joint) {
            Some(Some(target)) if target.fresh => {
                target.fresh = false;
                Some(target.angle)
            }
            _ => None,
        }
    }

    pub fn any_fresh(&self) -> bool {
        self.joints.iter().flatten().any(|t| t.fresh)
    }

    /// Angles for status reporting, `None` where no target exists yet
    pub fn angles(&self) -> [Option<NormalizedAngle>; NUM_JOINTS] {
        self.joints.map(|slot| slot.map(|t| t.angle))
    }

    /// When the last frame was applied
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Sequence number of the newest in-order frame
    pub fn last_sequence(&self) -> Option<u8> {
        self.tracker.last()
    }

    /// Forget sequence history after a link loss, keeping the targets
    pub fn on_link_lost(&mut self) {
        self.tracker.reset();
    }
}
