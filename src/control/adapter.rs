//! # Control Loop Adapter
//!
//! Turns joint targets into actuator commands once per control tick.
//!
//! A fresh target is issued and its flag cleared. Otherwise the previous
//! command is re-issued unchanged, so a silent link never relaxes the hand
//! or snaps it to zero. Joints that have never received a target are left
//! alone.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::targets::JointTargets;
use crate::protocol::frame::{NormalizedAngle, ANGLE_MAX, NUM_JOINTS};

/// Default time without fresh data before commands are reported stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(500);

/// Joint actuator driven by the control loop.
#[cfg_attr(test, mockall::automock)]
pub trait Actuator {
    /// Command a new target angle in radians
    fn set_target(&mut self, radians: f32);

    /// Measured joint angle in radians
    fn current_angle(&self) -> f32;
}

/// Command for one joint on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointCommand {
    /// No target has ever been received
    Unset,
    /// New target from fresh telemetry
    Update(f32),
    /// Previous target re-issued
    Hold(f32),
}

impl JointCommand {
    /// Target in radians, if any
    pub fn radians(&self) -> Option<f32> {
        match self {
            JointCommand::Unset => None,
            JointCommand::Update(r) | JointCommand::Hold(r) => Some(*r),
        }
    }
}

/// Commands for every joint on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub joints: [JointCommand; NUM_JOINTS],
    /// No fresh telemetry for longer than the stale threshold
    pub stale: bool,
}

/// Converts a normalized angle into radians over `travel_rad`
pub fn byte_to_radians(angle: NormalizedAngle, travel_rad: f32) -> f32 {
    angle as f32 / ANGLE_MAX as f32 * travel_rad
}

/// Hold-last-target adapter between [`JointTargets`] and actuators.
#[derive(Debug, Clone)]
pub struct ControlLoopAdapter {
    joint_travel_rad: f32,
    stale_after: Duration,
    last_commanded: [Option<f32>; NUM_JOINTS],
    stale_reported: bool,
}

impl ControlLoopAdapter {
    /// # Arguments
    ///
    /// * `joint_travel_rad` - Radians corresponding to a normalized angle of 255
    /// * `stale_after` - Time without fresh data before commands are marked stale
    pub fn new(joint_travel_rad: f32, stale_after: Duration) -> Self {
        Self {
            joint_travel_rad,
            stale_after,
            last_commanded: [None; NUM_JOINTS],
            stale_reported: false,
        }
    }

    /// Radians corresponding to a normalized angle of 255
    pub fn joint_travel_rad(&self) -> f32 {
        self.joint_travel_rad
    }

    /// True once a stale warning has been logged and not yet cleared
    pub fn is_stale(&self) -> bool {
        self.stale_reported
    }

    /// Consume fresh targets and build this tick's command
    pub fn consume(&mut self, targets: &mut JointTargets, now: Instant) -> ControlCommand {
        let mut joints = [JointCommand::Unset; NUM_JOINTS];

        for (joint, command) in joints.iter_mut().enumerate() {
            *command = match targets.take_fresh(joint) {
                Some(angle) => {
                    let radians = byte_to_radians(angle, self.joint_travel_rad);
                    self.last_commanded[joint] = Some(radians);
                    JointCommand::Update(radians)
                }
                None => match self.last_commanded[joint] {
                    Some(radians) => JointCommand::Hold(radians),
                    None => JointCommand::Unset,
                },
            };
        }

        let stale = targets
            .last_update()
            .is_some_and(|t| now.saturating_duration_since(t) >= self.stale_after);

        if stale && !self.stale_reported {
            warn!("No fresh telemetry for {:?}, holding last targets", self.stale_after);
            self.stale_reported = true;
        } else if !stale && self.stale_reported {
            info!("Fresh telemetry resumed");
            self.stale_reported = false;
        }

        ControlCommand { joints, stale }
    }

    /// Send a command to the actuators, one per joint in frame order
    ///
    /// Extra joints without an actuator are skipped.
    pub fn apply<A: Actuator>(&self, command: &ControlCommand, actuators: &mut [A]) {
        for (joint, actuator) in command.joints.iter().zip(actuators.iter_mut()) {
            if let Some(radians) = joint.radians() {
                actuator.set_target(radians);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::Frame;
    use std::f32::consts::FRAC_PI_2;

    fn adapter() -> ControlLoopAdapter {
        ControlLoopAdapter::new(FRAC_PI_2, Duration::from_millis(500))
    }

    #[test]
    fn test_byte_to_radians() {
        assert_eq!(byte_to_radians(0, FRAC_PI_2), 0.0);
        assert!((byte_to_radians(255, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-6);
        assert!((byte_to_radians(51, 1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_no_targets_yields_unset() {
        let mut adapter = adapter();
        let mut targets = JointTargets::new();

        let command = adapter.consume(&mut targets, Instant::now());

        assert_eq!(command.joints, [JointCommand::Unset; NUM_JOINTS]);
        assert!(!command.stale);
    }

    #[test]
    fn test_fresh_then_hold() {
        let mut adapter = ControlLoopAdapter::new(1.0, Duration::from_millis(500));
        let mut targets = JointTargets::new();
        let now = Instant::now();
        targets.apply(&Frame::new(1, [255, 0, 0, 0]), now);

        let first = adapter.consume(&mut targets, now);
        assert_eq!(first.joints[0], JointCommand::Update(1.0));
        assert!(!targets.any_fresh());

        let second = adapter.consume(&mut targets, now + Duration::from_millis(4));
        assert_eq!(second.joints[0], JointCommand::Hold(1.0));
        assert_eq!(second.joints[1], JointCommand::Hold(0.0));
    }

    #[test]
    fn test_holds_after_link_loss() {
        let mut adapter = ControlLoopAdapter::new(1.0, Duration::from_millis(500));
        let mut targets = JointTargets::new();
        let now = Instant::now();
        targets.apply(&Frame::new(1, [255, 255, 255, 255]), now);
        adapter.consume(&mut targets, now);

        targets.on_link_lost();

        for tick in 1..10 {
            let command = adapter.consume(&mut targets, now + Duration::from_millis(tick * 4));
            assert_eq!(command.joints, [JointCommand::Hold(1.0); NUM_JOINTS]);
        }
    }

    #[test]
    fn test_stale_marked_and_cleared() {
        let mut adapter = adapter();
        let mut targets = JointTargets::new();
        let start = Instant::now();
        targets.apply(&Frame::new(1, [10, 10, 10, 10]), start);

        assert!(!adapter.consume(&mut targets, start + Duration::from_millis(100)).stale);

        let stale = adapter.consume(&mut targets, start + Duration::from_millis(600));
        assert!(stale.stale);
        assert!(adapter.is_stale());
        assert!(matches!(stale.joints[0], JointCommand::Hold(_)));

        let resumed_at = start + Duration::from_millis(700);
        targets.apply(&Frame::new(2, [20, 20, 20, 20]), resumed_at);
        let fresh = adapter.consume(&mut targets, resumed_at);
        assert!(!fresh.stale);
        assert!(!adapter.is_stale());
        assert!(matches!(fresh.joints[0], JointCommand::Update(_)));
    }

    #[test]
    fn test_apply_commands_actuators() {
        let adapter = adapter();
        let command = ControlCommand {
            joints: [
                JointCommand::Update(0.5),
                JointCommand::Hold(0.25),
                JointCommand::Unset,
                JointCommand::Update(1.0),
            ],
            stale: false,
        };

        let mut first = MockActuator::new();
        first.expect_set_target().withf(|r| (*r - 0.5).abs() < 1e-6).times(1).return_const(());
        let mut second = MockActuator::new();
        second.expect_set_target().withf(|r| (*r - 0.25).abs() < 1e-6).times(1).return_const(());
        let mut third = MockActuator::new();
        third.expect_set_target().times(0);

        let mut actuators = vec![first, second, third];
        adapter.apply(&command, &mut actuators);
    }

    #[test]
    fn test_apply_with_fewer_actuators() {
        let adapter = adapter();
        let command = ControlCommand {
            joints: [JointCommand::Update(0.1); NUM_JOINTS],
            stale: false,
        };

        let mut only = MockActuator::new();
        only.expect_set_target().times(1).return_const(());

        adapter.apply(&command, &mut [only]);
    }
}
