//! # Glove Runtime
//!
//! Transmitting role: samples the flex sensors, streams frames to the hand
//! and runs operator-driven calibration.
//!
//! Transmission pauses while calibrating so that half-calibrated angles
//! never reach the hand.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{Config, GloveConfig};
use crate::error::Result;
use crate::link::port_trait::TokioSerialPort;
use crate::link::serial::{open_with_paths, send_frame};
use crate::protocol::frame::{joints, FrameBytes};
use crate::sensing::calibration::{
    CalibrationPhase, CalibrationReport, CalibrationSession, CalibrationStep, JointSampler,
};
use crate::sensing::scheduler::TransmitScheduler;
use crate::sensing::sensor::{FlexSensor, SimulatedFlexSensor};

/// Log a status line every this many frames (~1 s at 30 Hz)
const STATUS_EVERY_FRAMES: u64 = 30;

/// Sweep period of the simulated sensors
const SIMULATED_SWEEP_PERIOD: Duration = Duration::from_secs(4);

/// Loop wake-ups per transmit interval
const POLLS_PER_INTERVAL: u32 = 4;

/// Operator command that starts a calibration
const CALIBRATE_COMMAND: &str = "c";

/// What the glove is currently doing.
#[derive(Debug, Clone)]
pub enum GloveMode {
    Streaming,
    Calibrating(CalibrationSession),
}

/// Glove-side state: sensors, calibration and frame pacing.
#[derive(Debug)]
pub struct GloveNode<S: FlexSensor> {
    scheduler: TransmitScheduler,
    sampler: JointSampler,
    sensor: S,
    mode: GloveMode,
    frames_sent: u64,
}

impl<S: FlexSensor> GloveNode<S> {
    /// Create a streaming node with the configured default ranges
    pub fn new(config: &GloveConfig, sensor: S) -> Self {
        Self {
            scheduler: TransmitScheduler::new(config.tx_interval()),
            sampler: JointSampler::new(
                config.sensor_channels.clone(),
                config.coupling,
                config.default_range(),
            ),
            sensor,
            mode: GloveMode::Streaming,
            frames_sent: 0,
        }
    }

    pub fn mode(&self) -> &GloveMode {
        &self.mode
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.mode, GloveMode::Calibrating(_))
    }

    pub fn sampler(&self) -> &JointSampler {
        &self.sampler
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Direct access to the sensor bank
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Handle one line of operator input
    ///
    /// While streaming, `c` (any case) starts a calibration. While
    /// calibrating, any line acknowledges the current prompt.
    ///
    /// # Returns
    ///
    /// * `Option<String>` - Message to show the operator, if any
    pub fn handle_operator(&mut self, line: &str) -> Option<String> {
        if !self.is_calibrating() {
            if !line.trim().eq_ignore_ascii_case(CALIBRATE_COMMAND) {
                return None;
            }
            let session = CalibrationSession::new();
            let prompt = session.prompt().to_string();
            info!("Entering calibration, transmission paused");
            self.mode = GloveMode::Calibrating(session);
            return Some(prompt);
        }

        let step = match &mut self.mode {
            GloveMode::Calibrating(session) => {
                let step = session.acknowledge(&mut self.sensor, &mut self.sampler);
                (step, session.prompt())
            }
            GloveMode::Streaming => return None,
        };

        match step {
            (Some(CalibrationStep::RestCaptured(_)), prompt) => Some(prompt.to_string()),
            (Some(CalibrationStep::Complete(report)), _) => {
                self.mode = GloveMode::Streaming;
                info!("Calibration finished, resuming transmission");
                Some(self.summarize(&report))
            }
            (None, _) => {
                self.mode = GloveMode::Streaming;
                None
            }
        }
    }

    fn summarize(&self, report: &CalibrationReport) -> String {
        let ranges: Vec<String> = report
            .installed
            .iter()
            .map(|(axis, range)| format!("axis {}: {}-{}", axis, range.min, range.max))
            .collect();

        if report.is_complete() {
            format!("Calibration complete ({})", ranges.join(", "))
        } else {
            let rejected: Vec<String> = report.rejected.iter().map(|e| e.to_string()).collect();
            format!(
                "Calibration kept previous range for {} axis(es): {}",
                rejected.len(),
                rejected.join("; ")
            )
        }
    }

    /// Produce the next frame if one is due
    ///
    /// Returns `None` while calibrating, while no peer is connected, or
    /// before the transmit interval has elapsed.
    pub fn tick(&mut self, now: Instant, peer_connected: bool) -> Option<FrameBytes> {
        if self.is_calibrating() {
            return None;
        }

        let sampler = &self.sampler;
        let sensor = &mut self.sensor;
        let frame = self.scheduler.tick(now, peer_connected, || sampler.sample(sensor))?;

        self.frames_sent += 1;
        if self.frames_sent % STATUS_EVERY_FRAMES == 0 {
            info!(
                "TX: seq={} MCP={} PIP={}",
                frame[0],
                frame[1 + joints::MCP],
                frame[1 + joints::PIP]
            );
        }

        Some(frame)
    }
}

impl GloveNode<SimulatedFlexSensor> {
    /// Hold the simulated sensors in the pose the operator is asked for
    ///
    /// The sweep stops at `rest` while the flat hand is awaited and at
    /// `flex` while the fist is awaited, then resumes once streaming.
    pub fn hold_requested_pose(&mut self, rest: u16, flex: u16) {
        let pose = match &self.mode {
            GloveMode::Calibrating(session) => match session.phase() {
                CalibrationPhase::AwaitingRest => Some(rest),
                CalibrationPhase::AwaitingFlex => Some(flex),
                CalibrationPhase::Done => None,
            },
            GloveMode::Streaming => None,
        };
        self.sensor.set_fixed(pose);
    }
}

/// Loop period: a fraction of the transmit interval, at least 1 ms
fn poll_period(tx_interval: Duration) -> Duration {
    (tx_interval / POLLS_PER_INTERVAL).max(Duration::from_millis(1))
}

/// Run the glove role until Ctrl+C
///
/// Uses simulated flex sensors sweeping between the configured calibration
/// bounds. During an operator calibration the sweep is held at
/// `calibration_min` for the flat pose and `calibration_max` for the fist,
/// so the walkthrough installs exactly the configured range. Operator
/// commands are read from stdin.
pub async fn run(config: Config) -> Result<()> {
    let sensor = SimulatedFlexSensor::sweep(
        config.glove.calibration_min,
        config.glove.calibration_max,
        SIMULATED_SWEEP_PERIOD,
    );
    let mut node = GloveNode::new(&config.glove, sensor);

    let retry_backoff = config.link.timing().retry_backoff;
    let restart_delay = config.link.timing().rediscover_delay;

    let mut port: Option<TokioSerialPort> = None;
    let mut reopen_at = Instant::now();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut ticker = interval(poll_period(config.glove.tx_interval()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Glove running; type '{}' + Enter to calibrate", CALIBRATE_COMMAND);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some(message) = node.handle_operator(&line) {
                        info!("{}", message);
                    }
                    node.hold_requested_pose(
                        config.glove.calibration_min,
                        config.glove.calibration_max,
                    );
                }
                Ok(None) => {
                    debug!("Operator input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read operator input: {}", e);
                    stdin_open = false;
                }
            },

            _ = ticker.tick() => {
                let now = Instant::now();

                if port.is_none() && now >= reopen_at {
                    match open_with_paths(&config.link.ports, config.link.baud_rate) {
                        Ok((opened, path)) => {
                            info!("Peer connected on {}", path);
                            port = Some(opened);
                        }
                        Err(e) => {
                            warn!("{}; retrying in {:?}", e, retry_backoff);
                            reopen_at = now + retry_backoff;
                        }
                    }
                }

                if let Some(frame) = node.tick(now, port.is_some()) {
                    if let Some(link) = port.as_mut() {
                        if let Err(e) = send_frame(link, &frame).await {
                            warn!("Peer disconnected ({}), restarting link in {:?}", e, restart_delay);
                            port = None;
                            reopen_at = now + restart_delay;
                        }
                    }
                }
            }
        }
    }

    info!("Glove stopped after {} frames", node.frames_sent());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::decode_frame;
    use crate::sensing::calibration::{CalibrationRange, JointCoupling};
    use crate::sensing::sensor::MockFlexSensor;

    fn node_with(value: u16) -> GloveNode<SimulatedFlexSensor> {
        GloveNode::new(&GloveConfig::default(), SimulatedFlexSensor::fixed(value))
    }

    #[test]
    fn test_streams_when_connected() {
        let mut node = node_with(3000);
        let frame = node.tick(Instant::now(), true).unwrap();

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.sequence, 0);
        assert_eq!(decoded.angles, [255, 255, 255, 255]);
        assert_eq!(node.frames_sent(), 1);
    }

    #[test]
    fn test_silent_when_disconnected() {
        let mut node = node_with(2000);
        assert!(node.tick(Instant::now(), false).is_none());
        assert_eq!(node.frames_sent(), 0);
    }

    #[test]
    fn test_paced_by_interval() {
        let mut node = node_with(2000);
        let start = Instant::now();

        assert!(node.tick(start, true).is_some());
        assert!(node.tick(start + Duration::from_millis(10), true).is_none());
        assert!(node.tick(start + Duration::from_millis(33), true).is_some());
    }

    #[test]
    fn test_ignores_other_operator_input() {
        let mut node = node_with(2000);
        assert_eq!(node.handle_operator("hello"), None);
        assert!(!node.is_calibrating());
    }

    #[test]
    fn test_calibration_pauses_transmission() {
        let mut node = node_with(2000);
        let start = Instant::now();

        let prompt = node.handle_operator("C").unwrap();
        assert!(prompt.contains("FLAT"));
        assert!(node.is_calibrating());
        assert!(node.tick(start, true).is_none());
    }

    #[test]
    fn test_full_calibration_with_mock_sensor() {
        let mut sensor = MockFlexSensor::new();
        let mut readings = vec![500u16, 600, 3500, 3600].into_iter();
        sensor.expect_read_raw().times(4).returning(move |_| readings.next().unwrap_or(0));

        let mut node = GloveNode::new(&GloveConfig::default(), sensor);

        node.handle_operator("c");
        let prompt = node.handle_operator("").unwrap();
        assert!(prompt.contains("FIST"));

        let summary = node.handle_operator("").unwrap();
        assert!(summary.starts_with("Calibration complete"));
        assert!(!node.is_calibrating());
        assert_eq!(node.sampler().range(0), Some(&CalibrationRange { min: 500, max: 3500 }));
        assert_eq!(node.sampler().range(1), Some(&CalibrationRange { min: 600, max: 3600 }));
    }

    #[test]
    fn test_degenerate_calibration_keeps_previous_range() {
        let mut node = node_with(2000);

        node.handle_operator("c");
        node.handle_operator("");
        let summary = node.handle_operator("").unwrap();

        assert!(summary.contains("kept previous range for 2"));
        assert!(!node.is_calibrating());
        assert_eq!(node.sampler().range(0), Some(&CalibrationRange::default()));
        assert!(node.tick(Instant::now(), true).is_some());
    }

    #[test]
    fn test_simulated_calibration_holds_requested_poses() {
        let config = GloveConfig::default();
        let sensor = SimulatedFlexSensor::sweep(1000, 3000, Duration::from_millis(7));
        let mut node = GloveNode::new(&config, sensor);

        node.handle_operator("c");
        node.hold_requested_pose(1000, 3000);
        assert_eq!(node.sensor_mut().read_raw(0), 1000);

        node.handle_operator("");
        node.hold_requested_pose(1000, 3000);
        assert_eq!(node.sensor_mut().read_raw(0), 3000);

        let summary = node.handle_operator("").unwrap();
        node.hold_requested_pose(1000, 3000);
        assert!(summary.starts_with("Calibration complete"), "{}", summary);
        assert_eq!(node.sampler().range(0), Some(&CalibrationRange { min: 1000, max: 3000 }));
        assert_eq!(node.sampler().range(1), Some(&CalibrationRange { min: 1000, max: 3000 }));
    }

    #[test]
    fn test_streaming_resumes_sweep() {
        let mut node = GloveNode::new(
            &GloveConfig::default(),
            SimulatedFlexSensor::sweep(1000, 3000, Duration::from_secs(4)),
        );
        node.sensor_mut().set_fixed(Some(42));

        node.hold_requested_pose(1000, 3000);
        assert!((1000..=3000).contains(&node.sensor_mut().read_raw(0)));
    }

    #[test]
    fn test_poll_period_is_a_fraction_of_interval() {
        assert_eq!(poll_period(Duration::from_millis(33)), Duration::from_micros(8250));
        assert_eq!(poll_period(Duration::from_millis(2)), Duration::from_millis(1));
    }

    #[test]
    fn test_independent_coupling_samples_four_channels() {
        let config = GloveConfig {
            coupling: JointCoupling::Independent,
            sensor_channels: vec![1, 2, 3, 4],
            ..GloveConfig::default()
        };
        let mut sensor = MockFlexSensor::new();
        sensor.expect_read_raw().returning(|channel| match channel {
            1 => 1000,
            2 => 3000,
            3 => 2000,
            _ => 0,
        });

        let mut node = GloveNode::new(&config, sensor);
        let frame = node.tick(Instant::now(), true).unwrap();

        assert_eq!(&frame[1..5], &[0, 255, 127, 0]);
    }
}
