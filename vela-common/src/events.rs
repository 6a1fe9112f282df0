//! Event types for the Vela event system
//!
//! Provides the shared event definitions and the EventBus that wires sensor
//! inputs, the aggregated derivative processor, the player manager and the
//! control API together.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Player manager state
///
/// `Transitioning` is only observable while a foreground layer swap is in
/// flight; every transition ends in `Idle` or `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerState {
    /// No layer running
    Stopped,
    /// Base layer running, no foreground layer
    Idle,
    /// Base layer plus one foreground layer at `level`
    Playing { level: usize },
    /// Foreground layer swap in progress
    Transitioning { from: usize, to: usize },
}

impl PlayerState {
    /// Level the installation is currently committed to (0 when idle or stopped)
    pub fn level(&self) -> usize {
        match self {
            PlayerState::Stopped | PlayerState::Idle => 0,
            PlayerState::Playing { level } => *level,
            PlayerState::Transitioning { from, .. } => *from,
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "stopped"),
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Playing { level } => write!(f, "playing({})", level),
            PlayerState::Transitioning { from, to } => write!(f, "transitioning({}->{})", from, to),
        }
    }
}

/// Vela event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// Inbound events (`Reading`, `RequestThresholds`, `SetThreshold`) feed the
/// aggregated derivative processor; the rest are its outputs or player
/// notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VelaEvent {
    /// New sensor reading from an input
    Reading {
        /// Input that produced the reading ("network", "web", ...)
        source: String,
        /// Raw reading value
        value: f64,
    },

    /// Ask the processor to publish every threshold
    RequestThresholds,

    /// Overwrite one threshold (levels are 1-based)
    SetThreshold {
        level: usize,
        value: f64,
    },

    /// Current value of one threshold
    ///
    /// Published once per level after `RequestThresholds`, and after every
    /// successful `SetThreshold`.
    AgdThreshold {
        level: usize,
        value: f64,
    },

    /// Raw reading together with the aggregated derivative it produced
    ///
    /// Published once per processed reading.
    AgdOutput {
        source: String,
        raw: f64,
        agd: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Play level change request
    ///
    /// Edge-triggered when produced by the processor; the control API may also
    /// publish it directly.
    PlayLevelChange {
        level: usize,
        /// Human readable reason, e.g. "agd-network == 12.0" or "web"
        comment: String,
    },

    /// Player manager state changed
    PlayerStateChanged {
        old_state: PlayerState,
        new_state: PlayerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl VelaEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            VelaEvent::Reading { .. } => "Reading",
            VelaEvent::RequestThresholds => "RequestThresholds",
            VelaEvent::SetThreshold { .. } => "SetThreshold",
            VelaEvent::AgdThreshold { .. } => "AgdThreshold",
            VelaEvent::AgdOutput { .. } => "AgdOutput",
            VelaEvent::PlayLevelChange { .. } => "PlayLevelChange",
            VelaEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
        }
    }

    /// Whether the event is an output that control clients want to see
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            VelaEvent::AgdThreshold { .. }
                | VelaEvent::AgdOutput { .. }
                | VelaEvent::PlayLevelChange { .. }
                | VelaEvent::PlayerStateChanged { .. }
        )
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - FIFO delivery per producer
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use vela_common::events::{EventBus, VelaEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(VelaEvent::RequestThresholds);
/// assert_eq!(rx.try_recv().unwrap(), VelaEvent::RequestThresholds);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VelaEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after subscription.
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VelaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VelaEvent) {
        let _ = self.tx.send(event);
    }
}
