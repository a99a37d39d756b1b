//! Peer transport interface

use crate::error::TransportResult;
use friendify_core::PeerId;

/// Local wireless discovery and reliable messaging.
///
/// Implementations report what happens to them through the
/// [`EventSink`](friendify_core::EventSink) they were built with; the methods
/// here only issue commands and never block on the network.
pub trait PeerTransport: Send {
    /// Identifier of the local device on this transport
    fn local_peer(&self) -> PeerId;

    /// Begin advertising and browsing
    fn start(&mut self);

    /// Stop advertising and browsing, keeping existing connections
    fn suspend(&mut self);

    /// Stop discovery and disconnect every peer
    fn invalidate(&mut self);

    /// Reliably send `payload` to `peers`
    fn send(&mut self, payload: &[u8], peers: &[PeerId]) -> TransportResult<()>;
}
