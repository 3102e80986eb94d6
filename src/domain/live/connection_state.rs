//! Connection lifecycle for one live-feed scope.
//!
//! ```text
//! Closed ──visible──▶ Connecting ──open──▶ Open
//!   ▲                  │    ▲               │
//!   │           fail   ▼    │ retry         │ error/close
//!   ├──exhausted── Reconnecting ◀───────────┘
//!   │                  │
//!   └──── Closing ◀────┴──── (visibility lost, from any non-Closed state)
//! ```

use crate::domain::foundation::{StateMachine, Timestamp, VisibilitySessionId};

/// Transport state of a single scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
    Reconnecting,
    Closing,
}

impl ConnectionState {
    /// True for every state that owns (or is acquiring) a transport.
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Closed, Connecting)
                | (Connecting, Open)
                | (Connecting, Reconnecting)
                | (Connecting, Closing)
                | (Connecting, Closed)
                | (Open, Reconnecting)
                | (Open, Closing)
                | (Reconnecting, Connecting)
                | (Reconnecting, Closing)
                | (Reconnecting, Closed)
                | (Closing, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Closed => vec![Connecting],
            Connecting => vec![Open, Reconnecting, Closing, Closed],
            Open => vec![Reconnecting, Closing],
            Reconnecting => vec![Connecting, Closing, Closed],
            Closing => vec![Closed],
        }
    }
}

/// Why a scope last reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Visibility was lost (or the supervisor shut down).
    Stopped,
    /// Reconnect attempts ran out; the feed went silent.
    RetriesExhausted,
    /// No credential could be obtained for the token-in-query URL.
    AuthFailed,
}

/// Observable status of one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStatus {
    pub state: ConnectionState,
    /// Visibility session that owns the current transport, if any.
    pub session: Option<VisibilitySessionId>,
    /// Consecutive failed connects in the current session.
    pub reconnect_attempt: u32,
    pub last_close: Option<CloseReason>,
    pub changed_at: Timestamp,
}

impl ScopeStatus {
    pub fn closed() -> Self {
        Self {
            state: ConnectionState::Closed,
            session: None,
            reconnect_attempt: 0,
            last_close: None,
            changed_at: Timestamp::now(),
        }
    }

    /// True once reconnects have been exhausted and nothing is running.
    pub fn gave_up(&self) -> bool {
        self.state == ConnectionState::Closed
            && self.last_close == Some(CloseReason::RetriesExhausted)
    }
}

impl Default for ScopeStatus {
    fn default() -> Self {
        Self::closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn happy_path_is_legal() {
        let mut state = Closed;
        for next in [Connecting, Open, Closing, Closed] {
            state.advance(next).unwrap();
        }
        assert_eq!(state, Closed);
    }

    #[test]
    fn reconnect_cycle_is_legal() {
        let mut state = Open;
        for next in [Reconnecting, Connecting, Open] {
            state.advance(next).unwrap();
        }
    }

    #[test]
    fn closed_cannot_be_closed_again() {
        assert!(!Closed.can_transition_to(&Closing));
        assert!(!Closed.can_transition_to(&Closed));
    }

    #[test]
    fn open_requires_connecting_first() {
        assert!(Closed.transition_to(Open).is_err());
        assert!(Reconnecting.transition_to(Open).is_err());
    }

    #[test]
    fn every_non_closed_state_can_start_closing_or_is_closing() {
        for state in [Connecting, Open, Reconnecting] {
            assert!(state.can_transition_to(&Closing), "{:?}", state);
        }
        assert!(Closing.can_transition_to(&Closed));
    }

    #[test]
    fn gave_up_only_after_exhaustion() {
        let mut status = ScopeStatus::closed();
        assert!(!status.gave_up());
        status.last_close = Some(CloseReason::RetriesExhausted);
        assert!(status.gave_up());
        status.state = Connecting;
        assert!(!status.gave_up());
    }
}
