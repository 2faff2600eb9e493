//! Session state machine
//!
//! Defines the valid transitions of the cached connection state.

use std::fmt;

/// Cached view of the device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Events that drive [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connect attempt started
    ConnectStarted,
    /// The transport accepted the connection
    ConnectSucceeded,
    /// The transport refused or failed the connection
    ConnectFailed,
    /// Liveness reconciliation found the connection dead
    ProbeFailed,
    /// The consumer disconnected
    Disconnected,
}

impl SessionState {
    /// Next state for `event`, `None` if the event does not apply here
    pub fn apply(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (_, E::ConnectStarted) => Some(S::Connecting),
            (S::Connecting, E::ConnectSucceeded) => Some(S::Connected),
            (_, E::ConnectFailed) => Some(S::Disconnected),
            (S::Connected, E::ProbeFailed) => Some(S::Disconnected),
            (_, E::Disconnected) => Some(S::Disconnected),
            _ => None,
        }
    }

    pub fn is_connected(self) -> bool {
        self == SessionState::Connected
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}
