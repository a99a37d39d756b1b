//! Aggregate connection phase shown to the user

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall session state across all peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Nothing started yet
    #[default]
    Idle,
    /// Transport is advertising and browsing, no peer yet
    Discovering,
    /// A peer is mid-handshake on the transport
    Connecting,
    /// At least one peer is connected
    Connected,
    /// The most recent peer went away
    PeerEnded,
    /// The ranging engine suspended the session
    Suspended,
    /// Ranging needs a permission the user has not granted
    AccessRequired,
    /// This device cannot range at all
    Unsupported,
}

impl SessionState {
    /// Capability states are terminal: no event moves the session out of them
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AccessRequired | Self::Unsupported)
    }

    /// Text shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Not Connected",
            Self::Discovering => "Discovering Peer ...",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::PeerEnded => "Peer Ended",
            Self::Suspended => "Session suspended",
            Self::AccessRequired => {
                "Nearby Interactions access required. You can change access in Settings."
            }
            Self::Unsupported => "Nearby Interaction is not supported on this device",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_capability_states_are_terminal() {
        assert!(SessionState::AccessRequired.is_terminal());
        assert!(SessionState::Unsupported.is_terminal());
        assert!(!SessionState::PeerEnded.is_terminal());
        assert!(!SessionState::Suspended.is_terminal());
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
        assert_eq!(SessionState::default().to_string(), "Not Connected");
    }
}
