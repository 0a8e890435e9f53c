//! # Simulated Actuator
//!
//! Joint model for running the hand without motor hardware. Positions slew
//! toward the commanded target at a bounded speed.

use std::time::Duration;

use super::adapter::Actuator;

/// Default maximum joint speed in rad/s
pub const DEFAULT_VELOCITY_LIMIT: f32 = 20.0;

/// Slew-rate limited joint.
///
/// The position moves toward the target by at most `velocity_limit * dt`
/// each time [`SimulatedJoint::step`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedJoint {
    position: f32,
    target: f32,
    velocity_limit: f32,
}

impl SimulatedJoint {
    /// Create a joint at rest (position and target 0 rad)
    pub fn new(velocity_limit: f32) -> Self {
        Self {
            position: 0.0,
            target: 0.0,
            velocity_limit: velocity_limit.abs(),
        }
    }

    /// Last commanded target in radians
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Advance the simulation by `dt`
    pub fn step(&mut self, dt: Duration) {
        let max_delta = self.velocity_limit * dt.as_secs_f32();
        let error = self.target - self.position;
        self.position += error.clamp(-max_delta, max_delta);
    }
}

impl Default for SimulatedJoint {
    fn default() -> Self {
        Self::new(DEFAULT_VELOCITY_LIMIT)
    }
}

impl Actuator for SimulatedJoint {
    fn set_target(&mut self, radians: f32) {
        self.target = radians;
    }

    fn current_angle(&self) -> f32 {
        self.position
    }
}
