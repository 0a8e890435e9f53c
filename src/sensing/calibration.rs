//! # Calibration Module
//!
//! Maps raw flex sensor readings onto normalized joint angles.
//!
//! ## Range Mapping
//!
//! Each sensed axis has a [`CalibrationRange`] captured from two poses: the
//! hand held flat (rest, low bound) and a closed fist (full flex, high
//! bound). A raw reading is clamped into the range, interpolated linearly to
//! 0-180 degrees and rescaled to 0-255:
//!
//! `degrees = (raw - min) * 180 / (max - min)`
//! `angle = degrees * 255 / 180`
//!
//! Both divisions truncate. A range with `max <= min` maps every reading to
//! mid-scale (128) instead of dividing by zero.
//!
//! ## Joint Coupling
//!
//! The glove may sense fewer axes than the frame carries. With
//! [`JointCoupling::MirrorPip`] only MCP and PIP are sensed and the DIP and
//! TIP joints follow PIP.
//!
//! ## Usage
//!
//! ```
//! use glove_link::sensing::calibration::CalibrationRange;
//!
//! let range = CalibrationRange::from_poses(0, 1000, 3000).unwrap();
//!
//! assert_eq!(range.map(1000), 0);
//! assert_eq!(range.map(3000), 255);
//! assert_eq!(range.map(2000), 127);
//! ```

use serde::Deserialize;
use tracing::{info, warn};

use super::sensor::FlexSensor;
use crate::error::{GloveLinkError, Result};
use crate::protocol::frame::{
    joints, JointAngles, NormalizedAngle, ANGLE_MAX, ANGLE_MID, ANGLE_SPAN_DEG, NUM_JOINTS,
};

/// Factory low bound used before the first calibration
pub const DEFAULT_RAW_MIN: u16 = 1000;

/// Factory high bound used before the first calibration
pub const DEFAULT_RAW_MAX: u16 = 3000;

/// Raw readings captured for every sensed axis (unused axes stay zero)
pub type RawReadings = [u16; NUM_JOINTS];

/// Raw sensor bounds for one joint axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRange {
    /// Reading at rest pose (hand flat)
    pub min: u16,
    /// Reading at full flex (fist)
    pub max: u16,
}

impl Default for CalibrationRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_RAW_MIN,
            max: DEFAULT_RAW_MAX,
        }
    }
}

impl CalibrationRange {
    /// Builds a range from rest and full-flex readings.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateCalibration` if `flex <= rest`.
    pub fn from_poses(axis: usize, rest: u16, flex: u16) -> Result<Self> {
        if flex <= rest {
            return Err(GloveLinkError::DegenerateCalibration {
                axis,
                low: rest,
                high: flex,
            });
        }

        Ok(Self { min: rest, max: flex })
    }

    /// Returns true when the range can be used for interpolation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }

    /// Maps a raw reading to a normalized angle.
    ///
    /// Readings outside the range are clamped. A degenerate range yields
    /// [`ANGLE_MID`].
    #[must_use]
    pub fn map(&self, raw: u16) -> NormalizedAngle {
        if !self.is_valid() {
            return ANGLE_MID;
        }

        let clamped = raw.clamp(self.min, self.max);
        let span = (self.max - self.min) as u32;
        let degrees = (clamped - self.min) as u32 * ANGLE_SPAN_DEG as u32 / span;

        (degrees * ANGLE_MAX as u32 / ANGLE_SPAN_DEG as u32) as NormalizedAngle
    }
}

/// Maps a raw reading through a calibration range.
#[must_use]
pub fn map_to_angle(raw: u16, range: &CalibrationRange) -> NormalizedAngle {
    range.map(raw)
}

/// How sensed axes are expanded into the four frame joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointCoupling {
    /// MCP and PIP sensed; DIP and TIP copy PIP
    #[default]
    MirrorPip,
    /// All four joints sensed independently
    Independent,
}

impl JointCoupling {
    /// Number of physical sensor axes this policy reads.
    #[must_use]
    pub fn sensed_axes(&self) -> usize {
        match self {
            JointCoupling::MirrorPip => 2,
            JointCoupling::Independent => NUM_JOINTS,
        }
    }

    /// Expands per-axis angles into frame joint order.
    #[must_use]
    pub fn expand(&self, sensed: &JointAngles) -> JointAngles {
        match self {
            JointCoupling::MirrorPip => {
                let pip = sensed[joints::PIP];
                [sensed[joints::MCP], pip, pip, pip]
            }
            JointCoupling::Independent => *sensed,
        }
    }
}

/// Calibration state for the whole glove.
///
/// Owns one [`CalibrationRange`] per joint along with the ADC channel each
/// sensed axis is wired to.
#[derive(Debug, Clone)]
pub struct JointSampler {
    ranges: [CalibrationRange; NUM_JOINTS],
    channels: Vec<u8>,
    coupling: JointCoupling,
}

impl JointSampler {
    /// Creates a sampler with factory ranges.
    ///
    /// # Arguments
    ///
    /// * `channels` - ADC channel per sensed axis, in joint order
    /// * `coupling` - How sensed axes map onto frame joints
    /// * `default_range` - Range installed on every axis until calibrated
    ///
    /// Axes beyond `channels.len()` read as zero.
    #[must_use]
    pub fn new(channels: Vec<u8>, coupling: JointCoupling, default_range: CalibrationRange) -> Self {
        Self {
            ranges: [default_range; NUM_JOINTS],
            channels,
            coupling,
        }
    }

    /// Coupling policy in use
    #[must_use]
    pub fn coupling(&self) -> JointCoupling {
        self.coupling
    }

    /// Current range for an axis
    #[must_use]
    pub fn range(&self, axis: usize) -> Option<&CalibrationRange> {
        self.ranges.get(axis)
    }

    /// Reads every sensed axis without mapping.
    pub fn capture<S: FlexSensor + ?Sized>(&self, sensor: &mut S) -> RawReadings {
        let mut readings = [0u16; NUM_JOINTS];
        let axes = self.coupling.sensed_axes().min(self.channels.len());

        for (axis, reading) in readings.iter_mut().enumerate().take(axes) {
            *reading = sensor.read_raw(self.channels[axis]);
        }

        readings
    }

    /// Samples the sensors and returns calibrated joint angles in frame order.
    pub fn sample<S: FlexSensor + ?Sized>(&self, sensor: &mut S) -> JointAngles {
        let raw = self.capture(sensor);
        let mut sensed = [0; NUM_JOINTS];

        for axis in 0..self.coupling.sensed_axes() {
            sensed[axis] = self.ranges[axis].map(raw[axis]);
        }

        self.coupling.expand(&sensed)
    }

    /// Installs ranges from rest and flex captures.
    ///
    /// Each sensed axis is validated on its own. Valid axes take the new
    /// range; degenerate axes keep their previous range and are reported.
    pub fn install(&mut self, rest: &RawReadings, flex: &RawReadings) -> CalibrationReport {
        let mut report = CalibrationReport::default();

        for axis in 0..self.coupling.sensed_axes() {
            match CalibrationRange::from_poses(axis, rest[axis], flex[axis]) {
                Ok(range) => {
                    self.ranges[axis] = range;
                    report.installed.push((axis, range));
                }
                Err(e) => report.rejected.push(e),
            }
        }

        report
    }
}

/// Result of applying a calibration.
#[derive(Debug, Default)]
pub struct CalibrationReport {
    /// Axes whose range was replaced
    pub installed: Vec<(usize, CalibrationRange)>,
    /// Axes that kept their previous range
    pub rejected: Vec<GloveLinkError>,
}

impl CalibrationReport {
    /// True when every sensed axis accepted its new range
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Phase of an interactive calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Waiting for the operator to hold the hand flat
    AwaitingRest,
    /// Rest pose captured; waiting for a closed fist
    AwaitingFlex,
    /// Finished (accepted or rejected)
    Done,
}

/// Outcome of one operator acknowledgment.
#[derive(Debug)]
pub enum CalibrationStep {
    /// Rest pose captured
    RestCaptured(RawReadings),
    /// Flex pose captured and ranges applied
    Complete(CalibrationReport),
}

/// Two-step calibration driven by operator acknowledgments.
///
/// The session never blocks. The caller prompts the operator and forwards
/// each acknowledgment to [`CalibrationSession::acknowledge`].
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
    rest: RawReadings,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationSession {
    /// Starts a session waiting for the rest pose
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: CalibrationPhase::AwaitingRest,
            rest: [0; NUM_JOINTS],
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Operator prompt for the current phase
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match self.phase {
            CalibrationPhase::AwaitingRest => "Hold hand FLAT and press Enter...",
            CalibrationPhase::AwaitingFlex => "Make a FIST and press Enter...",
            CalibrationPhase::Done => "Calibration complete",
        }
    }

    /// Captures the current pose and advances the session.
    ///
    /// Returns `None` once the session is done.
    pub fn acknowledge<S: FlexSensor + ?Sized>(
        &mut self,
        sensor: &mut S,
        sampler: &mut JointSampler,
    ) -> Option<CalibrationStep> {
        match self.phase {
            CalibrationPhase::AwaitingRest => {
                self.rest = sampler.capture(sensor);
                self.phase = CalibrationPhase::AwaitingFlex;
                info!("Rest pose captured: {:?}", &self.rest[..sampler.coupling().sensed_axes()]);
                Some(CalibrationStep::RestCaptured(self.rest))
            }
            CalibrationPhase::AwaitingFlex => {
                let flex = sampler.capture(sensor);
                info!("Flex pose captured: {:?}", &flex[..sampler.coupling().sensed_axes()]);

                let report = sampler.install(&self.rest, &flex);
                for rejected in &report.rejected {
                    warn!("Calibration rejected, keeping previous range: {}", rejected);
                }

                self.phase = CalibrationPhase::Done;
                Some(CalibrationStep::Complete(report))
            }
            CalibrationPhase::Done => None,
        }
    }
}
