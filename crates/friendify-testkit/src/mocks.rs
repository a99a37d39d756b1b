//! Recording mocks for the transport and ranging boundaries
//!
//! Each mock shares its call log with a cloneable handle, so a test can hand
//! the mock to the orchestrator and still inspect what was asked of it.

use crate::fixtures;
use friendify_core::{DiscoveryToken, PeerId};
use friendify_ranging::{
    HandleId, RangingCapability, RangingEngine, RangingError, RangingHandle, RangingResult,
    RunConfiguration,
};
use friendify_transport::{PeerTransport, TransportError, TransportResult, WireMessage};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Transport
// ============================================================================

/// Call made on a [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `start`
    Start,
    /// `suspend`
    Suspend,
    /// `invalidate`
    Invalidate,
    /// `send`
    Send {
        /// Bytes sent
        payload: Vec<u8>,
        /// Targets
        peers: Vec<PeerId>,
    },
}

#[derive(Debug, Default)]
struct TransportState {
    calls: Vec<TransportCall>,
    failing: Option<String>,
}

/// Shared view of a [`MockTransport`]'s calls
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    state: Arc<Mutex<TransportState>>,
}

impl TransportLog {
    /// Every call so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `start` calls
    pub fn starts(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Start))
    }

    /// Number of `suspend` calls
    pub fn suspends(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Suspend))
    }

    /// Number of `invalidate` calls
    pub fn invalidations(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Invalidate))
    }

    /// Payloads sent, with their targets
    pub fn sends(&self) -> Vec<(Vec<u8>, Vec<PeerId>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Send { payload, peers } => Some((payload.clone(), peers.clone())),
                _ => None,
            })
            .collect()
    }

    /// Credentials sent to `peer`, in order
    pub fn credentials_sent_to(&self, peer: &PeerId) -> Vec<DiscoveryToken> {
        self.decoded_for(peer)
            .into_iter()
            .filter_map(|message| match message {
                WireMessage::Credential(token) => Some(token),
                WireMessage::Text(_) => None,
            })
            .collect()
    }

    /// Chat text sent to `peer`, in order
    pub fn texts_sent_to(&self, peer: &PeerId) -> Vec<String> {
        self.decoded_for(peer)
            .into_iter()
            .filter_map(|message| match message {
                WireMessage::Text(text) => Some(text),
                WireMessage::Credential(_) => None,
            })
            .collect()
    }

    /// Make every later send fail with `reason`
    pub fn fail_sends(&self, reason: impl Into<String>) {
        self.state.lock().failing = Some(reason.into());
    }

    /// Let sends succeed again
    pub fn heal(&self) {
        self.state.lock().failing = None;
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }

    fn decoded_for(&self, peer: &PeerId) -> Vec<WireMessage> {
        self.sends()
            .into_iter()
            .filter(|(_, peers)| peers.contains(peer))
            .filter_map(|(payload, _)| WireMessage::decode(&payload).ok())
            .collect()
    }

    fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: TransportCall) {
        self.state.lock().calls.push(call);
    }
}

/// Transport that records calls and never emits events on its own
#[derive(Debug)]
pub struct MockTransport {
    local: PeerId,
    log: TransportLog,
}

impl MockTransport {
    /// Mock for `local`, plus the handle to its call log
    pub fn new(local: PeerId) -> (Self, TransportLog) {
        let log = TransportLog::default();
        (
            Self {
                local,
                log: log.clone(),
            },
            log,
        )
    }

    /// Mock recording into an existing log
    pub fn with_log(local: PeerId, log: TransportLog) -> Self {
        Self { local, log }
    }
}

impl PeerTransport for MockTransport {
    fn local_peer(&self) -> PeerId {
        self.local
    }

    fn start(&mut self) {
        self.log.record(TransportCall::Start);
    }

    fn suspend(&mut self) {
        self.log.record(TransportCall::Suspend);
    }

    fn invalidate(&mut self) {
        self.log.record(TransportCall::Invalidate);
    }

    fn send(&mut self, payload: &[u8], peers: &[PeerId]) -> TransportResult<()> {
        self.log.record(TransportCall::Send {
            payload: payload.to_vec(),
            peers: peers.to_vec(),
        });
        match self.log.state.lock().failing.clone() {
            None => Ok(()),
            Some(reason) => Err(TransportError::SendFailed {
                peers: peers.to_vec(),
                reason,
            }),
        }
    }
}

// ============================================================================
// Ranging engine
// ============================================================================

/// Call made on a [`MockRangingEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangingCall {
    /// `create_handle` succeeded
    CreateHandle(HandleId),
    /// `run`
    Run {
        /// Handle run
        handle: HandleId,
        /// Peer credential it ran with
        credential: DiscoveryToken,
    },
    /// `invalidate`
    Invalidate(HandleId),
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Vec<RangingCall>,
    next_handle: u64,
    live: BTreeSet<HandleId>,
    failing_runs: bool,
}

/// Shared view of a [`MockRangingEngine`]'s calls
#[derive(Debug, Clone, Default)]
pub struct RangingLog {
    state: Arc<Mutex<EngineState>>,
}

impl RangingLog {
    /// Every call so far
    pub fn calls(&self) -> Vec<RangingCall> {
        self.state.lock().calls.clone()
    }

    /// Handles created, in order
    pub fn created(&self) -> Vec<HandleId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RangingCall::CreateHandle(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Credentials `handle` was run with, in order
    pub fn runs_for(&self, handle: HandleId) -> Vec<DiscoveryToken> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RangingCall::Run {
                    handle: ran,
                    credential,
                } if *ran == handle => Some(credential.clone()),
                _ => None,
            })
            .collect()
    }

    /// Total number of runs issued
    pub fn run_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, RangingCall::Run { .. }))
            .count()
    }

    /// Handles invalidated, in order
    pub fn invalidated(&self) -> Vec<HandleId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RangingCall::Invalidate(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Handles created and not yet invalidated
    pub fn live(&self) -> BTreeSet<HandleId> {
        self.state.lock().live.clone()
    }

    /// Make every later run fail
    pub fn fail_runs(&self, failing: bool) {
        self.state.lock().failing_runs = failing;
    }

    /// Forget recorded calls, keeping live handles
    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }
}

/// Ranging engine that hands out sequential handles with predictable
/// credentials and records every call
#[derive(Debug)]
pub struct MockRangingEngine {
    capability: RangingCapability,
    log: RangingLog,
}

impl MockRangingEngine {
    /// Supported engine, plus the handle to its call log
    pub fn new() -> (Self, RangingLog) {
        Self::with_capability(RangingCapability::Supported)
    }

    /// Engine reporting `capability`
    pub fn with_capability(capability: RangingCapability) -> (Self, RangingLog) {
        let log = RangingLog::default();
        (
            Self {
                capability,
                log: log.clone(),
            },
            log,
        )
    }
}

impl RangingEngine for MockRangingEngine {
    fn capability(&self) -> RangingCapability {
        self.capability
    }

    fn create_handle(&mut self) -> RangingResult<RangingHandle> {
        match self.capability {
            RangingCapability::Supported => {}
            RangingCapability::AccessRequired => return Err(RangingError::AccessRequired),
            RangingCapability::Unsupported => return Err(RangingError::Unsupported),
        }

        let mut state = self.log.state.lock();
        state.next_handle += 1;
        let id = HandleId(state.next_handle);
        state.live.insert(id);
        state.calls.push(RangingCall::CreateHandle(id));
        Ok(RangingHandle {
            id,
            local_credential: fixtures::local_credential(id),
        })
    }

    fn run(&mut self, handle: HandleId, config: &RunConfiguration) -> RangingResult<()> {
        let mut state = self.log.state.lock();
        state.calls.push(RangingCall::Run {
            handle,
            credential: config.peer_credential.clone(),
        });
        if !state.live.contains(&handle) {
            return Err(RangingError::UnknownHandle(handle));
        }
        if state.failing_runs {
            return Err(RangingError::Engine("run rejected".to_string()));
        }
        Ok(())
    }

    fn invalidate(&mut self, handle: HandleId) {
        let mut state = self.log.state.lock();
        state.live.remove(&handle);
        state.calls.push(RangingCall::Invalidate(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use friendify_transport::encode_credential;

    #[test]
    fn test_transport_log_decodes_sends() {
        let peer = fixtures::peer(2);
        let (mut transport, log) = MockTransport::new(fixtures::peer(1));
        let token = fixtures::peer_credential(2);

        transport.send(&encode_credential(&token).unwrap(), &[peer]).unwrap();
        transport
            .send(&WireMessage::Text("hi".into()).encode().unwrap(), &[peer])
            .unwrap();

        assert_eq!(log.credentials_sent_to(&peer), vec![token]);
        assert_eq!(log.texts_sent_to(&peer), vec!["hi"]);
        assert!(log.credentials_sent_to(&fixtures::peer(3)).is_empty());
    }

    #[test]
    fn test_failing_sends_still_record() {
        let (mut transport, log) = MockTransport::new(fixtures::peer(1));
        log.fail_sends("radio off");
        assert_matches!(
            transport.send(b"x", &[fixtures::peer(2)]),
            Err(TransportError::SendFailed { .. })
        );
        assert_eq!(log.sends().len(), 1);
    }

    #[test]
    fn test_engine_rejects_runs_on_dead_handles() {
        let (mut engine, log) = MockRangingEngine::new();
        let handle = engine.create_handle().unwrap();
        let config = RunConfiguration::new(fixtures::peer_credential(2));

        engine.run(handle.id, &config).unwrap();
        engine.invalidate(handle.id);
        assert_matches!(
            engine.run(handle.id, &config),
            Err(RangingError::UnknownHandle(_))
        );
        assert_eq!(log.runs_for(handle.id).len(), 2);
        assert!(log.live().is_empty());
    }

    #[test]
    fn test_engine_capability_gates_handles() {
        let (mut engine, log) = MockRangingEngine::with_capability(RangingCapability::AccessRequired);
        assert_matches!(engine.create_handle(), Err(RangingError::AccessRequired));
        assert!(log.created().is_empty());
    }
}
