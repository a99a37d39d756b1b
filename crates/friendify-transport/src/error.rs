//! Transport and wire-format errors

use friendify_core::PeerId;
use thiserror::Error;

/// Errors raised by a [`PeerTransport`](crate::PeerTransport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Payload could not be delivered to some peers
    #[error("send failed for {} peer(s): {reason}", peers.len())]
    SendFailed {
        /// Peers that did not receive the payload
        peers: Vec<PeerId>,
        /// Transport-specific reason
        reason: String,
    },

    /// Target peer is not connected
    #[error("peer {0} is not connected")]
    NotConnected(PeerId),

    /// The transport has been invalidated
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Peers that missed a payload because of this error
    pub fn affected_peers(&self, targets: &[PeerId]) -> Vec<PeerId> {
        match self {
            Self::SendFailed { peers, .. } => peers.clone(),
            Self::NotConnected(peer) => vec![*peer],
            Self::Closed => targets.to_vec(),
        }
    }
}

/// Errors raised while encoding or decoding wire messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Payload is neither a credential record nor UTF-8 text
    #[error("malformed payload ({len} bytes): neither credential nor text")]
    Malformed {
        /// Payload length
        len: usize,
    },

    /// Credential record could not be encoded
    #[error("failed to encode credential: {0}")]
    Encode(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
