//! Per-peer session state and the distance-ordered peer table

use friendify_core::{
    Classification, DiscoveryToken, DistanceDirectionState, PeerId, RangingClassifier,
    RangingSample,
};
use friendify_ranging::{HandleId, RangingHandle};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Everything known about one connected peer
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSession {
    /// Transport identifier
    pub id: PeerId,
    /// Name the peer advertised
    pub display_name: String,
    /// Ranging handle scoped to this peer
    pub handle: Option<HandleId>,
    /// Our credential for `handle`
    pub local_credential: Option<DiscoveryToken>,
    /// Credential received from the peer
    pub peer_credential: Option<DiscoveryToken>,
    /// Whether `local_credential` has been sent to the peer
    pub credential_shared: bool,
    /// Last measured distance in meters
    pub last_distance: Option<f32>,
    /// Current spatial classification
    pub classification: Classification,
    /// Malformed payloads received from this peer
    pub protocol_violations: u32,
}

impl PeerSession {
    /// Fresh session for a newly connected peer
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            handle: None,
            local_credential: None,
            peer_credential: None,
            credential_shared: false,
            last_distance: None,
            classification: Classification::default(),
            protocol_violations: 0,
        }
    }

    /// Bind a ranging handle. A different handle than before resets the
    /// share flag so the new credential gets sent. Returns whether the handle
    /// changed.
    pub fn attach_handle(&mut self, handle: &RangingHandle) -> bool {
        if self.handle == Some(handle.id) {
            return false;
        }
        self.handle = Some(handle.id);
        self.local_credential = Some(handle.local_credential.clone());
        self.credential_shared = false;
        true
    }

    /// Forget the ranging handle after it was discarded
    pub fn detach_handle(&mut self) {
        self.handle = None;
        self.local_credential = None;
        self.credential_shared = false;
        self.classification.state = DistanceDirectionState::Unknown;
    }

    /// Whether our credential still has to be sent
    pub fn needs_share(&self) -> bool {
        self.local_credential.is_some() && !self.credential_shared
    }
}

/// Sessions keyed by peer, plus a view ordered by ascending distance with
/// unknown distances last
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    sessions: HashMap<PeerId, PeerSession>,
    order: Vec<PeerId>,
}

impl PeerTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Returns `false`, leaving the table unchanged, if the
    /// peer already has one.
    pub fn insert(&mut self, session: PeerSession) -> bool {
        if self.sessions.contains_key(&session.id) {
            return false;
        }
        self.order.push(session.id);
        self.sessions.insert(session.id, session);
        self.resort();
        true
    }

    /// Remove and return a session
    pub fn remove(&mut self, peer: &PeerId) -> Option<PeerSession> {
        let session = self.sessions.remove(peer)?;
        self.order.retain(|id| id != peer);
        Some(session)
    }

    /// Drop every session
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.order.clear();
    }

    /// Session for `peer`
    pub fn get(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer)
    }

    /// Mutable session for `peer`. Distance changes must go through
    /// [`record_sample`](Self::record_sample) to keep the order.
    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(peer)
    }

    /// Whether `peer` has a session
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Apply a ranging sample to `peer`, reclassify it and restore the order
    pub fn record_sample(
        &mut self,
        peer: &PeerId,
        sample: &RangingSample,
        classifier: &RangingClassifier,
    ) -> Option<&PeerSession> {
        let session = self.sessions.get_mut(peer)?;
        session.last_distance = sample.distance;
        session.classification = classifier.evaluate(sample, &session.classification);
        self.resort();
        self.sessions.get(peer)
    }

    /// Peer identifiers, nearest first
    pub fn order(&self) -> &[PeerId] {
        &self.order
    }

    /// Sessions, nearest first
    pub fn ordered(&self) -> impl Iterator<Item = &PeerSession> + '_ {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    /// Nearest peer, if any
    pub fn nearest(&self) -> Option<&PeerSession> {
        self.ordered().next()
    }

    /// Whether the order view is sorted
    pub fn is_ordered(&self) -> bool {
        self.order.windows(2).all(|pair| {
            let a = self.sessions.get(&pair[0]).and_then(|s| s.last_distance);
            let b = self.sessions.get(&pair[1]).and_then(|s| s.last_distance);
            compare_distance(a, b) != Ordering::Greater
        })
    }

    fn resort(&mut self) {
        let sessions = &self.sessions;
        // Stable, so peers at equal distance keep their relative order
        self.order.sort_by(|a, b| {
            compare_distance(
                sessions.get(a).and_then(|s| s.last_distance),
                sessions.get(b).and_then(|s| s.last_distance),
            )
        });
    }
}

fn compare_distance(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
