//! # Link State Machine
//!
//! Connection lifecycle of the receiving (hand) role.
//!
//! ```text
//!            discover            peer found            connected
//!   Idle ─────────────► Discovering ─────────► Connecting ─────────► Linked
//!    ▲                    ▲   │ scan timeout       │ connect failed      │
//!    │                    │   └── retry after ─────┘ retry after         │
//!    │                    │       backoff            backoff             │
//!    └──────────────────────── link lost (rediscover after delay) ───────┘
//! ```
//!
//! [`transition`] is a pure function of `(state, event)` returning the next
//! state and a list of [`LinkEffect`]s. Side effects (opening ports, timers,
//! updating joint targets) are carried out by the caller.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DecodeError;
use crate::protocol::decoder::decode_frame;
use crate::protocol::frame::Frame;

/// Delay before scanning again after a failed connect or an empty scan
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before rediscovering after the link drops, lets the radio stack reset
pub const DEFAULT_REDISCOVER_DELAY: Duration = Duration::from_millis(500);

/// Address of a discovered peer (device path for serial links)
pub type PeerAddr = String;

/// Connection state of the receiving role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    Discovering,
    Connecting,
    Linked,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Discovering => "discovering",
            LinkState::Connecting => "connecting",
            LinkState::Linked => "linked",
        };
        f.write_str(name)
    }
}

/// Discrete events emitted by the link layer (or its timers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Begin (or resume) looking for a peer
    Discover,
    /// Scan found a peer advertising the telemetry service
    PeerFound(PeerAddr),
    /// Scan window elapsed without finding a peer
    ScanTimedOut,
    /// Connection to the peer is established
    Connected,
    /// Connection attempt failed
    ConnectFailed(String),
    /// Established connection dropped
    Disconnected,
    /// Notification payload received from the peer
    DataReceived(Vec<u8>),
}

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEffect {
    /// Start a scan after `delay`
    StartScan { delay: Duration },
    /// Open a connection to the peer
    Connect(PeerAddr),
    /// Deliver [`LinkEvent::Discover`] after `delay`
    ScheduleDiscover { delay: Duration },
    /// A validated frame to apply to joint targets
    Accept(Frame),
    /// A frame that failed validation and was discarded
    Drop(DecodeError),
    /// The link was lost; connected status must be cleared
    LinkLost,
}

/// Timing parameters for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub retry_backoff: Duration,
    pub rediscover_delay: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            rediscover_delay: DEFAULT_REDISCOVER_DELAY,
        }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: LinkState,
    pub effects: Vec<LinkEffect>,
}

impl Transition {
    fn to(next: LinkState, effects: Vec<LinkEffect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: LinkState) -> Self {
        Self { next: state, effects: Vec::new() }
    }
}

/// Computes the next state and effects for an event.
///
/// Events that are not meaningful in the current state leave it unchanged
/// and produce no effects.
pub fn transition(state: LinkState, event: &LinkEvent, timing: &LinkTiming) -> Transition {
    use LinkEffect as Fx;
    use LinkEvent as Ev;
    use LinkState as St;

    match (state, event) {
        (St::Idle, Ev::Discover) => {
            Transition::to(St::Discovering, vec![Fx::StartScan { delay: Duration::ZERO }])
        }

        (St::Discovering, Ev::PeerFound(addr)) => {
            Transition::to(St::Connecting, vec![Fx::Connect(addr.clone())])
        }
        (St::Discovering, Ev::ScanTimedOut) => Transition::to(
            St::Discovering,
            vec![Fx::StartScan { delay: timing.retry_backoff }],
        ),

        (St::Connecting, Ev::Connected) => Transition::to(St::Linked, Vec::new()),
        (St::Connecting, Ev::ConnectFailed(_)) | (St::Connecting, Ev::Disconnected) => {
            Transition::to(
                St::Discovering,
                vec![Fx::StartScan { delay: timing.retry_backoff }],
            )
        }

        (St::Linked, Ev::DataReceived(bytes)) => {
            let effect = match decode_frame(bytes) {
                Ok(frame) => Fx::Accept(frame),
                Err(e) => Fx::Drop(e),
            };
            Transition::to(St::Linked, vec![effect])
        }
        (St::Linked, Ev::Disconnected) => Transition::to(
            St::Idle,
            vec![
                Fx::LinkLost,
                Fx::ScheduleDiscover { delay: timing.rediscover_delay },
            ],
        ),

        (current, _) => Transition::stay(current),
    }
}

/// Owns the current [`LinkState`] and applies events to it.
#[derive(Debug, Clone, Default)]
pub struct LinkStateMachine {
    state: LinkState,
    timing: LinkTiming,
}

impl LinkStateMachine {
    /// Creates a machine in [`LinkState::Idle`]
    pub fn new(timing: LinkTiming) -> Self {
        Self {
            state: LinkState::Idle,
            timing,
        }
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True while exchanging telemetry with a peer
    pub fn is_linked(&self) -> bool {
        self.state == LinkState::Linked
    }

    /// Timing parameters in use
    pub fn timing(&self) -> &LinkTiming {
        &self.timing
    }

    /// Applies an event and returns the effects to perform
    pub fn handle(&mut self, event: &LinkEvent) -> Vec<LinkEffect> {
        let Transition { next, effects } = transition(self.state, event, &self.timing);

        if next != self.state {
            match (self.state, event) {
                (LinkState::Linked, LinkEvent::Disconnected) => warn!("Link lost, holding last targets"),
                (LinkState::Connecting, LinkEvent::ConnectFailed(reason)) => {
                    warn!("Failed to connect ({}), retrying in {:?}", reason, self.timing.retry_backoff)
                }
                _ => {}
            }
            info!("Link state: {} -> {}", self.state, next);
            self.state = next;
        } else if effects.is_empty() && !matches!(event, LinkEvent::DataReceived(_)) {
            debug!("Ignoring {:?} while {}", event, self.state);
        }

        effects
    }
}
