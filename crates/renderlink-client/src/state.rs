use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Connection lifecycle states.
///
/// `Disconnected → Connecting → Handshaking → Connected → Closing →
/// Disconnected`. Only the session thread and `disconnect` mutate this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
    Closing,
}

/// Snapshot of the link status for host UI consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub is_closing: bool,
}

/// Shared link status: the lifecycle state plus the alive flag.
///
/// The alive flag is the sole mid-session termination signal. Any loop
/// flips it false on error; the peer loop observes it on its next
/// iteration. Polled, never signaled.
pub(crate) struct LinkStatus {
    state: Mutex<LinkState>,
    alive: AtomicBool,
}

impl LinkStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LinkState::Disconnected),
            alive: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        *self.state.lock().expect("link state poisoned")
    }

    pub(crate) fn set(&self, state: LinkState) {
        *self.state.lock().expect("link state poisoned") = state;
    }

    pub(crate) fn info(&self) -> ConnectionInfo {
        let state = self.state();
        ConnectionInfo {
            is_connected: state == LinkState::Connected,
            is_connecting: matches!(state, LinkState::Connecting | LinkState::Handshaking),
            is_closing: state == LinkState::Closing,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn set_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_and_dead() {
        let status = LinkStatus::new();
        assert_eq!(status.state(), LinkState::Disconnected);
        assert!(!status.is_alive());

        let info = status.info();
        assert!(!info.is_connected && !info.is_connecting && !info.is_closing);
    }

    #[test]
    fn info_tracks_lifecycle_states() {
        let status = LinkStatus::new();

        status.set(LinkState::Connecting);
        assert!(status.info().is_connecting);

        status.set(LinkState::Handshaking);
        assert!(status.info().is_connecting);

        status.set(LinkState::Connected);
        let info = status.info();
        assert!(info.is_connected && !info.is_connecting);

        status.set(LinkState::Closing);
        assert!(status.info().is_closing);
    }

    #[test]
    fn alive_flag_flips() {
        let status = LinkStatus::new();
        status.set_alive();
        assert!(status.is_alive());
        status.mark_dead();
        assert!(!status.is_alive());
    }
}
