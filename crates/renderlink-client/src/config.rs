use std::time::Duration;

use renderlink_frame::DEFAULT_MAX_PAYLOAD;

/// Tunable timings and limits for a bridge client session.
///
/// Defaults match the wire contract of the bridge service; the durations are
/// injectable mostly so tests don't have to wait out a 10 second heartbeat
/// window.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for the initial TCP connect. `None` blocks until the OS
    /// gives up.
    pub connect_timeout: Option<Duration>,
    /// How long the sender loop sleeps when the operation queue is empty.
    pub sender_idle: Duration,
    /// Poll step of the heartbeat timer.
    pub heartbeat_step: Duration,
    /// Idle window after which a heartbeat timer emits one keep-alive.
    pub heartbeat_window: Duration,
    /// Pause after an unrecognized opcode before reading on. Defensive
    /// against desynchronized streams, not a recovery mechanism.
    pub unknown_opcode_pause: Duration,
    /// Maximum accepted string/blob payload size.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            sender_idle: Duration::from_millis(25),
            heartbeat_step: Duration::from_millis(500),
            heartbeat_window: Duration::from_secs(10),
            unknown_opcode_pause: Duration::from_secs(1),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
