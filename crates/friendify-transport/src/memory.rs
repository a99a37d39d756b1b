//! In-memory peer network
//!
//! Every [`MemoryTransport`] joined to the same [`MemoryNetwork`] can see the
//! others. Discovery runs synchronously whenever a node starts: browsing
//! nodes invite advertising nodes in peer-id order, subject to each side's
//! [`DiscoveryPolicy`]. Events are pushed into each node's sink as they
//! happen, so delivery order matches call order.

use crate::discovery::DiscoveryPolicy;
use crate::error::{TransportError, TransportResult};
use crate::events::TransportEvent;
use crate::traits::PeerTransport;
use friendify_core::{EventSink, PeerId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

struct Node {
    display_name: String,
    policy: DiscoveryPolicy,
    advertising: bool,
    browsing: bool,
    connected: BTreeSet<PeerId>,
    sink: EventSink<TransportEvent>,
}

#[derive(Default)]
struct NetworkState {
    nodes: BTreeMap<PeerId, Node>,
}

impl NetworkState {
    fn emit(&self, to: &PeerId, event: TransportEvent) {
        if let Some(node) = self.nodes.get(to) {
            node.sink.emit(event);
        }
    }

    fn find_match(&self) -> Option<(PeerId, PeerId)> {
        for (browser_id, browser) in self.nodes.iter().filter(|(_, n)| n.browsing) {
            for (advertiser_id, advertiser) in self.nodes.iter().filter(|(_, n)| n.advertising) {
                if browser_id == advertiser_id || browser.connected.contains(advertiser_id) {
                    continue;
                }
                let advertisement = advertiser.policy.advertisement();
                if browser
                    .policy
                    .should_invite(&advertisement, browser.connected.len())
                    && advertiser.policy.should_accept(advertiser.connected.len())
                {
                    return Some((*browser_id, *advertiser_id));
                }
            }
        }
        None
    }

    fn discover(&mut self) {
        while let Some((browser, advertiser)) = self.find_match() {
            self.connect(browser, advertiser);
        }
    }

    fn connect(&mut self, a: PeerId, b: PeerId) {
        let (Some(a_name), Some(b_name)) = (
            self.nodes.get(&a).map(|n| n.display_name.clone()),
            self.nodes.get(&b).map(|n| n.display_name.clone()),
        ) else {
            return;
        };
        debug!(browser = %a, advertiser = %b, "Memory network connecting peers");

        self.emit(&a, TransportEvent::Connecting { peer: b });
        self.emit(&b, TransportEvent::Connecting { peer: a });
        if let Some(node) = self.nodes.get_mut(&a) {
            node.connected.insert(b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.connected.insert(a);
        }
        self.emit(
            &a,
            TransportEvent::Connected {
                peer: b,
                display_name: b_name,
            },
        );
        self.emit(
            &b,
            TransportEvent::Connected {
                peer: a,
                display_name: a_name,
            },
        );
    }

    fn disconnect(&mut self, a: PeerId, b: PeerId) -> bool {
        let removed = self
            .nodes
            .get_mut(&a)
            .map(|n| n.connected.remove(&b))
            .unwrap_or(false);
        if let Some(node) = self.nodes.get_mut(&b) {
            node.connected.remove(&a);
        }
        if removed {
            self.emit(&a, TransportEvent::Disconnected { peer: b });
            self.emit(&b, TransportEvent::Disconnected { peer: a });
        }
        removed
    }

    fn drop_all(&mut self, peer: PeerId) {
        let others: Vec<PeerId> = self
            .nodes
            .get(&peer)
            .map(|n| n.connected.iter().copied().collect())
            .unwrap_or_default();
        for other in others {
            self.disconnect(peer, other);
        }
    }
}

/// Shared in-memory medium
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("nodes", &self.state.lock().nodes.len())
            .finish()
    }
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a new node with a fresh identifier
    pub fn join(
        &self,
        display_name: impl Into<String>,
        policy: DiscoveryPolicy,
        sink: EventSink<TransportEvent>,
    ) -> MemoryTransport {
        self.join_as(PeerId::new(), display_name, policy, sink)
    }

    /// Join a new node under a chosen identifier
    pub fn join_as(
        &self,
        peer: PeerId,
        display_name: impl Into<String>,
        policy: DiscoveryPolicy,
        sink: EventSink<TransportEvent>,
    ) -> MemoryTransport {
        self.state.lock().nodes.insert(
            peer,
            Node {
                display_name: display_name.into(),
                policy,
                advertising: false,
                browsing: false,
                connected: BTreeSet::new(),
                sink,
            },
        );
        MemoryTransport {
            network: self.clone(),
            peer,
        }
    }

    /// Sever the link between two peers, as if they walked out of range
    pub fn disconnect(&self, a: PeerId, b: PeerId) -> bool {
        self.state.lock().disconnect(a, b)
    }

    /// Whether two peers are linked
    pub fn is_connected(&self, a: PeerId, b: PeerId) -> bool {
        self.state
            .lock()
            .nodes
            .get(&a)
            .map(|n| n.connected.contains(&b))
            .unwrap_or(false)
    }

    /// Peers linked to `peer`
    pub fn connections(&self, peer: PeerId) -> Vec<PeerId> {
        self.state
            .lock()
            .nodes
            .get(&peer)
            .map(|n| n.connected.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `peer` is advertising and browsing
    pub fn is_discovering(&self, peer: PeerId) -> bool {
        self.state
            .lock()
            .nodes
            .get(&peer)
            .map(|n| n.advertising && n.browsing)
            .unwrap_or(false)
    }
}

/// One node on a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    peer: PeerId,
}

impl MemoryTransport {
    /// Network this node is joined to
    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl PeerTransport for MemoryTransport {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn start(&mut self) {
        let mut state = self.network.state.lock();
        if let Some(node) = state.nodes.get_mut(&self.peer) {
            node.advertising = true;
            node.browsing = true;
        }
        state.discover();
    }

    fn suspend(&mut self) {
        let mut state = self.network.state.lock();
        let Some(node) = state.nodes.get_mut(&self.peer) else {
            return;
        };
        node.advertising = false;
        node.browsing = false;

        let watchers: Vec<PeerId> = state
            .nodes
            .iter()
            .filter(|(id, n)| **id != self.peer && n.browsing && !n.connected.contains(&self.peer))
            .map(|(id, _)| *id)
            .collect();
        for watcher in watchers {
            state.emit(&watcher, TransportEvent::LostPeer { peer: self.peer });
        }
    }

    fn invalidate(&mut self) {
        let mut state = self.network.state.lock();
        if let Some(node) = state.nodes.get_mut(&self.peer) {
            node.advertising = false;
            node.browsing = false;
        }
        state.drop_all(self.peer);
    }

    fn send(&mut self, payload: &[u8], peers: &[PeerId]) -> TransportResult<()> {
        let state = self.network.state.lock();
        let Some(node) = state.nodes.get(&self.peer) else {
            return Err(TransportError::Closed);
        };

        let (reachable, missing): (Vec<PeerId>, Vec<PeerId>) =
            peers.iter().copied().partition(|p| node.connected.contains(p));
        for target in reachable {
            state.emit(
                &target,
                TransportEvent::DataReceived {
                    peer: self.peer,
                    payload: payload.to_vec(),
                },
            );
        }

        match missing.as_slice() {
            [] => Ok(()),
            [peer] => Err(TransportError::NotConnected(*peer)),
            _ => Err(TransportError::SendFailed {
                peers: missing,
                reason: "peers not connected".to_string(),
            }),
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let mut state = self.network.state.lock();
        state.drop_all(self.peer);
        state.nodes.remove(&self.peer);
    }
}
