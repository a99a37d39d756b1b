//! Transport coordinator
//!
//! Owns exactly one [`PeerTransport`] and tracks which peers it currently
//! reports connected. Discovery is self-limiting: once the connected count
//! reaches the cap, advertising and browsing are suspended, and they resume
//! as soon as a peer drops below it.

use crate::error::TransportError;
use crate::events::TransportEvent;
use crate::traits::PeerTransport;
use friendify_core::{EventSink, PeerId};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Discovery phase of the owned transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    /// Never started, or invalidated
    Stopped,
    /// Advertising and browsing
    Active,
    /// Suspended on request
    Suspended,
    /// Suspended because the peer cap was reached
    AtCapacity,
}

/// Owner of the transport session
pub struct TransportCoordinator {
    transport: Box<dyn PeerTransport>,
    max_peers: usize,
    connected: IndexMap<PeerId, String>,
    phase: DiscoveryPhase,
    failures: EventSink<TransportEvent>,
}

impl std::fmt::Debug for TransportCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCoordinator")
            .field("local_peer", &self.transport.local_peer())
            .field("max_peers", &self.max_peers)
            .field("connected", &self.connected.len())
            .field("phase", &self.phase)
            .finish()
    }
}

impl TransportCoordinator {
    /// Wrap a transport. Send failures are reported through `failures`.
    pub fn new(
        transport: Box<dyn PeerTransport>,
        max_peers: usize,
        failures: EventSink<TransportEvent>,
    ) -> Self {
        Self {
            transport,
            max_peers: max_peers.max(1),
            connected: IndexMap::new(),
            phase: DiscoveryPhase::Stopped,
            failures,
        }
    }

    /// Local device identifier
    pub fn local_peer(&self) -> PeerId {
        self.transport.local_peer()
    }

    /// Current discovery phase
    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    /// Connected-peer cap
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Begin advertising and browsing. Calling it again while active does
    /// nothing; calling it at capacity defers discovery until a peer drops.
    pub fn start(&mut self) {
        match self.phase {
            DiscoveryPhase::Active | DiscoveryPhase::AtCapacity => {
                debug!(phase = ?self.phase, "Transport already started");
            }
            DiscoveryPhase::Stopped | DiscoveryPhase::Suspended => {
                if self.at_capacity() {
                    self.phase = DiscoveryPhase::AtCapacity;
                    debug!(connected = self.connected.len(), "Start deferred at peer cap");
                    return;
                }
                self.transport.start();
                self.phase = DiscoveryPhase::Active;
                info!(local = %self.local_peer(), "Transport discovery started");
            }
        }
    }

    /// Stop advertising and browsing, keeping connections
    pub fn suspend(&mut self) {
        match self.phase {
            DiscoveryPhase::Active => {
                self.transport.suspend();
                self.phase = DiscoveryPhase::Suspended;
                info!("Transport discovery suspended");
            }
            DiscoveryPhase::AtCapacity => self.phase = DiscoveryPhase::Suspended,
            DiscoveryPhase::Stopped | DiscoveryPhase::Suspended => {}
        }
    }

    /// Suspend and disconnect every peer
    pub fn invalidate(&mut self) {
        self.transport.invalidate();
        let dropped = self.connected.len();
        self.connected.clear();
        self.phase = DiscoveryPhase::Stopped;
        info!(dropped, "Transport invalidated");
    }

    /// Send `payload` to every connected peer. Returns how many peers were
    /// targeted; delivery failures arrive later as
    /// [`TransportEvent::SendFailed`].
    pub fn broadcast(&mut self, payload: &[u8]) -> usize {
        let peers: Vec<PeerId> = self.connected.keys().copied().collect();
        self.send_to(payload, &peers)
    }

    /// Send `payload` to specific peers, with the same failure reporting as
    /// [`broadcast`](Self::broadcast)
    pub fn send_to(&mut self, payload: &[u8], peers: &[PeerId]) -> usize {
        if peers.is_empty() {
            debug!(bytes = payload.len(), "No peers to send to");
            return 0;
        }
        if let Err(error) = self.transport.send(payload, peers) {
            self.report_failure(&error, peers);
        }
        peers.len()
    }

    fn report_failure(&self, error: &TransportError, targets: &[PeerId]) {
        let peers = error.affected_peers(targets);
        warn!(peers = peers.len(), error = %error, "Send failed");
        self.failures.emit(TransportEvent::SendFailed {
            peers,
            error: error.to_string(),
        });
    }

    /// Apply a transport event to the connected set, suspending or resuming
    /// discovery around the cap
    pub fn observe(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Connected { peer, display_name } => {
                self.connected.insert(*peer, display_name.clone());
                if self.phase == DiscoveryPhase::Active && self.at_capacity() {
                    self.transport.suspend();
                    self.phase = DiscoveryPhase::AtCapacity;
                    info!(connected = self.connected.len(), "Peer cap reached, discovery suspended");
                }
            }
            TransportEvent::Disconnected { peer } => {
                self.forget(peer);
            }
            _ => {}
        }
    }

    /// Stop counting `peer` as connected without touching its link, resuming
    /// discovery if that frees a slot under the cap. Returns whether the peer
    /// was counted.
    pub fn forget(&mut self, peer: &PeerId) -> bool {
        if self.connected.shift_remove(peer).is_none() {
            return false;
        }
        if self.phase == DiscoveryPhase::AtCapacity && !self.at_capacity() {
            self.transport.start();
            self.phase = DiscoveryPhase::Active;
            info!(connected = self.connected.len(), "Below peer cap, discovery resumed");
        }
        true
    }

    /// Peers currently connected, in connection order
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connected.keys().copied().collect()
    }

    /// Whether `peer` is connected
    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected.contains_key(peer)
    }

    /// Name a connected peer advertised
    pub fn display_name(&self, peer: &PeerId) -> Option<&str> {
        self.connected.get(peer).map(String::as_str)
    }

    fn at_capacity(&self) -> bool {
        self.connected.len() >= self.max_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start,
        Suspend,
        Invalidate,
        Send(Vec<PeerId>),
    }

    struct Recording {
        local: PeerId,
        calls: Arc<Mutex<Vec<Call>>>,
        fail_sends: bool,
    }

    impl PeerTransport for Recording {
        fn local_peer(&self) -> PeerId {
            self.local
        }
        fn start(&mut self) {
            self.calls.lock().push(Call::Start);
        }
        fn suspend(&mut self) {
            self.calls.lock().push(Call::Suspend);
        }
        fn invalidate(&mut self) {
            self.calls.lock().push(Call::Invalidate);
        }
        fn send(&mut self, _payload: &[u8], peers: &[PeerId]) -> Result<(), TransportError> {
            self.calls.lock().push(Call::Send(peers.to_vec()));
            if self.fail_sends {
                return Err(TransportError::SendFailed {
                    peers: peers.to_vec(),
                    reason: "radio off".into(),
                });
            }
            Ok(())
        }
    }

    fn coordinator(
        max_peers: usize,
        fail_sends: bool,
    ) -> (
        TransportCoordinator,
        Arc<Mutex<Vec<Call>>>,
        tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let transport = Recording {
            local: PeerId::from_seed(0),
            calls: calls.clone(),
            fail_sends,
        };
        let (sink, rx) = EventSink::channel();
        (
            TransportCoordinator::new(Box::new(transport), max_peers, sink),
            calls,
            rx,
        )
    }

    fn connected(seed: u8) -> TransportEvent {
        TransportEvent::Connected {
            peer: PeerId::from_seed(seed),
            display_name: format!("peer {seed}"),
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut coordinator, calls, _rx) = coordinator(1, false);
        coordinator.start();
        coordinator.start();
        assert_eq!(*calls.lock(), vec![Call::Start]);
        assert_eq!(coordinator.phase(), DiscoveryPhase::Active);

        coordinator.suspend();
        coordinator.start();
        assert_eq!(*calls.lock(), vec![Call::Start, Call::Suspend, Call::Start]);
    }

    #[test]
    fn test_cap_suspends_and_resumes_discovery() {
        let (mut coordinator, calls, _rx) = coordinator(2, false);
        coordinator.start();

        coordinator.observe(&connected(1));
        assert_eq!(coordinator.phase(), DiscoveryPhase::Active);
        coordinator.observe(&connected(2));
        assert_eq!(coordinator.phase(), DiscoveryPhase::AtCapacity);

        coordinator.observe(&TransportEvent::Disconnected {
            peer: PeerId::from_seed(1),
        });
        assert_eq!(coordinator.phase(), DiscoveryPhase::Active);
        assert_eq!(coordinator.connected_peers(), vec![PeerId::from_seed(2)]);
        assert_eq!(
            *calls.lock(),
            vec![Call::Start, Call::Suspend, Call::Start]
        );
    }

    #[test]
    fn test_manual_suspend_is_not_auto_resumed() {
        let (mut coordinator, calls, _rx) = coordinator(1, false);
        coordinator.start();
        coordinator.suspend();
        coordinator.observe(&connected(1));
        coordinator.observe(&TransportEvent::Disconnected {
            peer: PeerId::from_seed(1),
        });
        assert_eq!(coordinator.phase(), DiscoveryPhase::Suspended);
        assert_eq!(*calls.lock(), vec![Call::Start, Call::Suspend]);
    }

    #[test]
    fn test_forget_frees_a_slot_and_resumes_discovery() {
        let (mut coordinator, calls, _rx) = coordinator(1, false);
        coordinator.start();
        coordinator.observe(&connected(1));
        assert_eq!(coordinator.phase(), DiscoveryPhase::AtCapacity);

        assert!(coordinator.forget(&PeerId::from_seed(1)));
        assert_eq!(coordinator.phase(), DiscoveryPhase::Active);
        assert!(coordinator.connected_peers().is_empty());
        assert_eq!(
            *calls.lock(),
            vec![Call::Start, Call::Suspend, Call::Start]
        );

        // A later disconnect for the same peer changes nothing
        assert!(!coordinator.forget(&PeerId::from_seed(1)));
        coordinator.observe(&TransportEvent::Disconnected {
            peer: PeerId::from_seed(1),
        });
        assert_eq!(calls.lock().len(), 3);
    }

    #[test]
    fn test_unknown_disconnect_is_ignored() {
        let (mut coordinator, calls, _rx) = coordinator(1, false);
        coordinator.start();
        coordinator.observe(&connected(1));
        coordinator.observe(&TransportEvent::Disconnected {
            peer: PeerId::from_seed(9),
        });
        assert_eq!(coordinator.phase(), DiscoveryPhase::AtCapacity);
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_broadcast_targets_connected_peers() {
        let (mut coordinator, calls, mut rx) = coordinator(3, false);
        assert_eq!(coordinator.broadcast(b"hello"), 0);

        coordinator.observe(&connected(1));
        coordinator.observe(&connected(2));
        assert_eq!(coordinator.broadcast(b"hello"), 2);
        assert_eq!(
            calls.lock().last(),
            Some(&Call::Send(vec![PeerId::from_seed(1), PeerId::from_seed(2)]))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_failure_is_reported_not_returned() {
        let (mut coordinator, _calls, mut rx) = coordinator(1, true);
        coordinator.observe(&connected(1));
        assert_eq!(coordinator.broadcast(b"hello"), 1);
        assert_matches!(
            rx.try_recv(),
            Ok(TransportEvent::SendFailed { peers, .. }) if peers == vec![PeerId::from_seed(1)]
        );
    }

    #[test]
    fn test_invalidate_clears_connections() {
        let (mut coordinator, calls, _rx) = coordinator(1, false);
        coordinator.start();
        coordinator.observe(&connected(1));
        coordinator.invalidate();
        assert!(coordinator.connected_peers().is_empty());
        assert_eq!(coordinator.phase(), DiscoveryPhase::Stopped);
        assert_eq!(calls.lock().last(), Some(&Call::Invalidate));

        coordinator.start();
        assert_eq!(coordinator.phase(), DiscoveryPhase::Active);
    }

    #[test]
    fn test_display_names_are_tracked() {
        let (mut coordinator, _calls, _rx) = coordinator(2, false);
        coordinator.observe(&connected(4));
        assert_eq!(coordinator.display_name(&PeerId::from_seed(4)), Some("peer 4"));
        assert!(coordinator.is_connected(&PeerId::from_seed(4)));
        assert_eq!(coordinator.display_name(&PeerId::from_seed(5)), None);
    }
}
