//! Events reported by a peer transport

use friendify_core::PeerId;

/// Something that happened on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Peer finished connecting
    Connected {
        /// Connected peer
        peer: PeerId,
        /// Name the peer advertised
        display_name: String,
    },
    /// Peer dropped
    Disconnected {
        /// Dropped peer
        peer: PeerId,
    },
    /// Peer is mid-handshake
    Connecting {
        /// Connecting peer
        peer: PeerId,
    },
    /// Transport reported a state it does not recognize
    UnknownState {
        /// Affected peer
        peer: PeerId,
    },
    /// Payload arrived from a peer
    DataReceived {
        /// Sender
        peer: PeerId,
        /// Raw payload
        payload: Vec<u8>,
    },
    /// A previously discovered peer stopped advertising
    LostPeer {
        /// Lost peer
        peer: PeerId,
    },
    /// A send did not reach some peers
    SendFailed {
        /// Peers that missed the payload
        peers: Vec<PeerId>,
        /// Transport-specific reason
        error: String,
    },
}

impl TransportEvent {
    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::UnknownState { .. } => "unknown-state",
            Self::DataReceived { .. } => "data-received",
            Self::LostPeer { .. } => "lost-peer",
            Self::SendFailed { .. } => "send-failed",
        }
    }
}
