//! Session identity and lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier issued when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a protocol session.
///
/// ```text
/// Connecting ──> Open ──> Closed
///      │           │        ^
///      └───> Erroring ──────┘
/// ```
///
/// Any state may also move straight to `Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Waiting for the transport handshake.
    Connecting,
    /// Accepting requests.
    Open,
    /// A transport failure was observed; about to close.
    Erroring,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Open)
                | (Connecting | Open, Erroring)
                | (Connecting | Open | Erroring, Closed)
        )
    }

    /// Whether the state is terminal.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Erroring => "erroring",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Connecting.can_transition_to(Open));
        assert!(Open.can_transition_to(Closed));
        assert!(Open.can_transition_to(Erroring));
        assert!(Erroring.can_transition_to(Closed));
        assert!(Connecting.can_transition_to(Closed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Closed));
        assert!(!Erroring.can_transition_to(Open));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn test_session_id_round_trips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-session".parse::<SessionId>().is_err());
    }
}
