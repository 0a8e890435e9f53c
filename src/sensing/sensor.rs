//! # Flex Sensor Sampling
//!
//! Abstraction over the ADC that samples the glove's flex sensors, plus a
//! simulated sensor used by the host build.

use std::time::{Duration, Instant};

/// Full-scale reading of a 12-bit ADC
pub const ADC_MAX: u16 = 4095;

/// Raw flex sensor sampling.
///
/// Implementations return the latest raw reading for an ADC channel. The
/// value range depends on the converter resolution (0-4095 for 12 bits).
#[cfg_attr(test, mockall::automock)]
pub trait FlexSensor {
    /// Read the raw value of one ADC channel
    fn read_raw(&mut self, channel: u8) -> u16;
}

/// Simulated flex sensor bank.
///
/// Produces a triangle-wave sweep between `low` and `high` so that the whole
/// pipeline can run without hardware. Each channel is phase shifted by an
/// eighth of the period. A fixed value can be forced for calibration
/// walkthroughs and tests.
#[derive(Debug, Clone)]
pub struct SimulatedFlexSensor {
    start: Instant,
    period: Duration,
    low: u16,
    high: u16,
    fixed: Option<u16>,
}

impl SimulatedFlexSensor {
    /// Creates a sweeping sensor
    ///
    /// # Arguments
    ///
    /// * `low` - Reading at full extension
    /// * `high` - Reading at full flex
    /// * `period` - Duration of one open-close-open cycle
    #[must_use]
    pub fn sweep(low: u16, high: u16, period: Duration) -> Self {
        Self {
            start: Instant::now(),
            period: period.max(Duration::from_millis(1)),
            low: low.min(ADC_MAX),
            high: high.min(ADC_MAX),
            fixed: None,
        }
    }

    /// Creates a sensor that always reports `value` on every channel
    #[must_use]
    pub fn fixed(value: u16) -> Self {
        let mut sensor = Self::sweep(0, ADC_MAX, Duration::from_secs(1));
        sensor.fixed = Some(value.min(ADC_MAX));
        sensor
    }

    /// Forces a fixed reading, or resumes the sweep with `None`
    pub fn set_fixed(&mut self, value: Option<u16>) {
        self.fixed = value.map(|v| v.min(ADC_MAX));
    }

    /// Sweep value for a channel at the given instant
    fn sweep_at(&self, channel: u8, now: Instant) -> u16 {
        let period_us = self.period.as_micros().max(1);
        let offset_us = period_us * (channel as u128 % 8) / 8;
        let t = (now.duration_since(self.start).as_micros() + offset_us) % period_us;

        // Triangle wave: 0 -> 1 over the first half, 1 -> 0 over the second
        let half = period_us / 2;
        let position = if t < half { t } else { period_us - t };
        let span = self.high.saturating_sub(self.low) as u128;

        self.low + (span * position / half.max(1)).min(span) as u16
    }
}

impl FlexSensor for SimulatedFlexSensor {
    fn read_raw(&mut self, channel: u8) -> u16 {
        match self.fixed {
            Some(value) => value,
            None => self.sweep_at(channel, Instant::now()),
        }
    }
}
