//! # Hand Runtime
//!
//! Receiving role: tracks the link, applies validated frames to joint
//! targets and drives the actuators every control tick.
//!
//! Link events are queued by the transport tasks and drained once per
//! control tick, so the control loop never waits on the link.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::actuator::SimulatedJoint;
use crate::control::adapter::{Actuator, ControlCommand, ControlLoopAdapter};
use crate::control::targets::JointTargets;
use crate::error::Result;
use crate::link::serial::SerialLinkDriver;
use crate::link::state::{LinkEffect, LinkEvent, LinkState, LinkStateMachine};
use crate::telemetry::logger::{TelemetryLogger, TelemetryRecord};
use crate::telemetry::stats::{LinkStats, SequenceStep};

/// Capacity of the link event queue
const EVENT_QUEUE_DEPTH: usize = 64;

/// Hand-side state shared by the link handler and the control tick.
#[derive(Debug)]
pub struct HandNode {
    machine: LinkStateMachine,
    targets: JointTargets,
    adapter: ControlLoopAdapter,
    stats: LinkStats,
    ticks: u64,
    status_every: u64,
}

impl HandNode {
    /// Create an idle node with unset targets and zeroed statistics
    pub fn new(config: &Config) -> Self {
        Self {
            machine: LinkStateMachine::new(config.link.timing()),
            targets: JointTargets::new(),
            adapter: ControlLoopAdapter::new(
                config.hand.joint_travel_rad(),
                config.hand.stale_after(),
            ),
            stats: LinkStats::default(),
            ticks: 0,
            status_every: config.hand.control_rate_hz.max(1) as u64,
        }
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.machine.state()
    }

    /// Latest joint targets, held across link loss
    pub fn targets(&self) -> &JointTargets {
        &self.targets
    }

    /// Receive-side link counters
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Update the resync counter from the transport's running total
    pub fn record_resync_bytes(&mut self, total: u64) {
        self.stats.resync_bytes = total;
    }

    /// Apply one link event
    ///
    /// Accepted frames update the joint targets; dropped frames only touch
    /// the statistics. Returns the effects the transport still has to
    /// carry out.
    pub fn handle_event(&mut self, event: LinkEvent, now: Instant) -> Vec<LinkEffect> {
        if matches!(event, LinkEvent::ConnectFailed(_)) && self.state() == LinkState::Connecting {
            self.stats.connect_failures += 1;
        }

        let effects = self.machine.handle(&event);

        for effect in &effects {
            match effect {
                LinkEffect::Accept(frame) => {
                    let step = self.targets.apply(frame, now);
                    self.stats.record_accepted(step);
                    match step {
                        SequenceStep::Advanced { missed } if missed > 0 => {
                            debug!("Sequence gap before seq={}: {} missed", frame.sequence, missed)
                        }
                        SequenceStep::Late => debug!("Late frame seq={}", frame.sequence),
                        _ => {}
                    }
                }
                LinkEffect::Drop(e) => {
                    self.stats.record_dropped(e);
                    debug!("Dropped frame: {}", e);
                }
                LinkEffect::LinkLost => {
                    self.stats.link_losses += 1;
                    self.targets.on_link_lost();
                }
                LinkEffect::StartScan { .. }
                | LinkEffect::Connect(_)
                | LinkEffect::ScheduleDiscover { .. } => {}
            }
        }

        effects
    }

    /// One control tick: consume targets and command the actuators
    pub fn control_tick<A: Actuator>(&mut self, now: Instant, actuators: &mut [A]) -> ControlCommand {
        let command = self.adapter.consume(&mut self.targets, now);
        self.adapter.apply(&command, actuators);

        self.ticks += 1;
        if self.ticks % self.status_every == 0 {
            let position = actuators.first().map(|a| a.current_angle());
            info!(
                "Status: link={} seq={:?} targets={:?} stale={} accepted={} dropped={} position={:?}",
                self.state(),
                self.targets.last_sequence(),
                self.targets.angles(),
                command.stale,
                self.stats.frames_accepted,
                self.stats.frames_dropped(),
                position
            );
        }

        command
    }

    /// Snapshot for the telemetry log
    pub fn telemetry_record(&self) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Utc::now(),
            link_state: self.state().to_string(),
            last_sequence: self.targets.last_sequence(),
            targets: self.targets.angles(),
            stale: self.adapter.is_stale(),
            stats: self.stats,
        }
    }
}

/// Run the hand role until Ctrl+C
///
/// Drives simulated joints from the frames received over the serial link.
pub async fn run(config: Config) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let driver = SerialLinkDriver::new(
        config.link.ports.clone(),
        config.link.baud_rate,
        config.link.scan_window(),
        events_tx,
    );

    let mut node = HandNode::new(&config);
    let mut joints: Vec<SimulatedJoint> = (0..config.hand.active_joints)
        .map(|_| SimulatedJoint::new(config.hand.velocity_limit))
        .collect();

    let mut logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )?)
    } else {
        None
    };
    let log_interval = Duration::from_millis(config.telemetry.log_interval_ms);
    let mut last_log = Instant::now();

    for effect in node.handle_event(LinkEvent::Discover, Instant::now()) {
        driver.execute(&effect);
    }

    let period = config.hand.control_period();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Hand running: {} joint(s) at {} Hz",
        config.hand.active_joints, config.hand.control_rate_hz
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }

            _ = ticker.tick() => {
                let now = Instant::now();

                while let Ok(event) = events_rx.try_recv() {
                    for effect in node.handle_event(event, now) {
                        driver.execute(&effect);
                    }
                }

                node.control_tick(now, &mut joints);
                for joint in joints.iter_mut() {
                    joint.step(period);
                }

                if let Some(logger) = logger.as_mut() {
                    if now.duration_since(last_log) >= log_interval {
                        last_log = now;
                        node.record_resync_bytes(driver.skipped_bytes());
                        if let Err(e) = logger.write(&node.telemetry_record()) {
                            warn!("Failed to write telemetry record: {}", e);
                        }
                    }
                }
            }
        }
    }

    if let Some(logger) = logger.as_mut() {
        logger.flush()?;
    }

    info!(
        "Hand stopped: {} frames accepted, {} dropped",
        node.stats().frames_accepted,
        node.stats().frames_dropped()
    );
    Ok(())
}
