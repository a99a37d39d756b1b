//! Ranging coordinator
//!
//! Owns one engine handle per peer and turns engine lifecycle events into
//! [`RangingSignal`]s for the orchestrator. Recovery follows a fixed policy:
//!
//! | Engine event | Action |
//! |---|---|
//! | suspension ended, run known | re-issue the same run |
//! | suspension ended, no run | discard handle, restart handshake |
//! | invalidated | discard handle, restart handshake |
//! | removed: peer ended | discard handle, end the peer |
//! | removed: timeout | re-issue the last run, if any |

use crate::engine::{
    HandleId, RangingCapability, RangingEngine, RangingEvent, RangingHandle, RemovalReason,
    RunConfiguration,
};
use crate::error::RangingResult;
use friendify_core::{DiscoveryToken, PeerId, RangingSample};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What the orchestrator should do about an engine event
#[derive(Debug, Clone, PartialEq)]
pub enum RangingSignal {
    /// Fresh measurement for a peer
    Sample {
        /// Measured peer
        peer: PeerId,
        /// Credential the engine reported
        credential: DiscoveryToken,
        /// Measurement
        sample: RangingSample,
    },
    /// Ranging for the peer paused
    Suspended {
        /// Affected peer
        peer: PeerId,
    },
    /// Suspension ended and the run was re-issued
    Resumed {
        /// Affected peer
        peer: PeerId,
    },
    /// Handle was discarded; share a new credential and run again
    RestartHandshake {
        /// Affected peer
        peer: PeerId,
    },
    /// Peer ended ranging; its session is over
    PeerEnded {
        /// Affected peer
        peer: PeerId,
    },
    /// Run lapsed and was re-issued
    Recovered {
        /// Affected peer
        peer: PeerId,
    },
}

#[derive(Debug)]
struct PeerRanging {
    handle: RangingHandle,
    run: Option<RunConfiguration>,
}

/// Owner of the per-peer ranging handles
pub struct RangingCoordinator {
    engine: Box<dyn RangingEngine>,
    peers: HashMap<PeerId, PeerRanging>,
    owners: HashMap<HandleId, PeerId>,
}

impl std::fmt::Debug for RangingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangingCoordinator")
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}

impl RangingCoordinator {
    /// Wrap an engine
    pub fn new(engine: Box<dyn RangingEngine>) -> Self {
        Self {
            engine,
            peers: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Engine capability
    pub fn capability(&self) -> RangingCapability {
        self.engine.capability()
    }

    /// Ensure `peer` has a handle, creating one if needed
    pub fn prepare(&mut self, peer: PeerId) -> RangingResult<RangingHandle> {
        if let Some(existing) = self.peers.get(&peer) {
            return Ok(existing.handle.clone());
        }

        let handle = self.engine.create_handle()?;
        debug!(peer = %peer, handle = %handle.id, "Created ranging handle");
        self.owners.insert(handle.id, peer);
        self.peers.insert(
            peer,
            PeerRanging {
                handle: handle.clone(),
                run: None,
            },
        );
        Ok(handle)
    }

    /// Run against `peer_credential`, replacing any earlier run for `peer`
    pub fn start_ranging(
        &mut self,
        peer: PeerId,
        peer_credential: DiscoveryToken,
    ) -> RangingResult<HandleId> {
        let handle = self.prepare(peer)?.id;
        let config = RunConfiguration::new(peer_credential);
        self.engine.run(handle, &config)?;
        info!(peer = %peer, handle = %handle, credential = %config.peer_credential, "Ranging run issued");
        if let Some(entry) = self.peers.get_mut(&peer) {
            entry.run = Some(config);
        }
        Ok(handle)
    }

    /// Re-issue the stored run for `peer`. Returns `false` when there is none.
    pub fn rerun(&mut self, peer: PeerId) -> RangingResult<bool> {
        let Some(entry) = self.peers.get(&peer) else {
            return Ok(false);
        };
        let Some(config) = entry.run.clone() else {
            return Ok(false);
        };
        self.engine.run(entry.handle.id, &config)?;
        debug!(peer = %peer, handle = %entry.handle.id, "Ranging run re-issued");
        Ok(true)
    }

    /// Invalidate and forget the handle for `peer`
    pub fn discard(&mut self, peer: PeerId) -> Option<HandleId> {
        let entry = self.peers.remove(&peer)?;
        self.owners.remove(&entry.handle.id);
        self.engine.invalidate(entry.handle.id);
        debug!(peer = %peer, handle = %entry.handle.id, "Ranging handle discarded");
        Some(entry.handle.id)
    }

    /// Invalidate every handle
    pub fn shutdown(&mut self) {
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer in peers {
            self.discard(peer);
        }
    }

    /// Handle currently owned by `peer`
    pub fn handle(&self, peer: &PeerId) -> Option<&RangingHandle> {
        self.peers.get(peer).map(|entry| &entry.handle)
    }

    /// Local credential of `peer`'s handle
    pub fn local_credential(&self, peer: &PeerId) -> Option<&DiscoveryToken> {
        self.handle(peer).map(|handle| &handle.local_credential)
    }

    /// Run configuration last issued for `peer`
    pub fn run_configuration(&self, peer: &PeerId) -> Option<&RunConfiguration> {
        self.peers.get(peer).and_then(|entry| entry.run.as_ref())
    }

    /// Peer owning `handle`
    pub fn owner(&self, handle: &HandleId) -> Option<PeerId> {
        self.owners.get(handle).copied()
    }

    /// Apply the recovery policy to an engine event
    pub fn handle_event(&mut self, event: RangingEvent) -> Option<RangingSignal> {
        let handle = event.handle();
        let Some(peer) = self.owner(&handle) else {
            debug!(handle = %handle, "Ignoring event for unknown ranging handle");
            return None;
        };

        match event {
            RangingEvent::SamplesUpdated {
                credential, sample, ..
            } => Some(RangingSignal::Sample {
                peer,
                credential,
                sample,
            }),

            RangingEvent::Suspended(_) => {
                info!(peer = %peer, handle = %handle, "Ranging suspended");
                Some(RangingSignal::Suspended { peer })
            }

            RangingEvent::SuspensionEnded(_) => match self.rerun(peer) {
                Ok(true) => {
                    info!(peer = %peer, handle = %handle, "Ranging suspension ended, run re-issued");
                    Some(RangingSignal::Resumed { peer })
                }
                Ok(false) => {
                    info!(peer = %peer, handle = %handle, "Ranging suspension ended without a run");
                    self.restart(peer)
                }
                Err(error) => {
                    warn!(peer = %peer, error = %error, "Re-run after suspension failed");
                    self.restart(peer)
                }
            },

            RangingEvent::Invalidated { reason, .. } => {
                warn!(peer = %peer, handle = %handle, reason = %reason, "Ranging handle invalidated");
                self.restart(peer)
            }

            RangingEvent::Removed {
                reason: RemovalReason::PeerEnded,
                ..
            } => {
                info!(peer = %peer, handle = %handle, "Peer ended ranging");
                self.discard(peer);
                Some(RangingSignal::PeerEnded { peer })
            }

            RangingEvent::Removed {
                reason: RemovalReason::Timeout,
                ..
            } => match self.rerun(peer) {
                Ok(true) => {
                    info!(peer = %peer, handle = %handle, "Ranging timed out, run re-issued");
                    Some(RangingSignal::Recovered { peer })
                }
                Ok(false) => {
                    debug!(peer = %peer, handle = %handle, "Ranging timed out before any run");
                    None
                }
                Err(error) => {
                    warn!(peer = %peer, error = %error, "Re-run after timeout failed");
                    self.restart(peer)
                }
            },
        }
    }

    fn restart(&mut self, peer: PeerId) -> Option<RangingSignal> {
        self.discard(peer);
        Some(RangingSignal::RestartHandshake { peer })
    }
}

impl Drop for RangingCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RangingError;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(HandleId),
        Run(HandleId, DiscoveryToken),
        Invalidate(HandleId),
    }

    #[derive(Default)]
    struct Recording {
        next: u64,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl RangingEngine for Recording {
        fn capability(&self) -> RangingCapability {
            RangingCapability::Supported
        }
        fn create_handle(&mut self) -> RangingResult<RangingHandle> {
            self.next += 1;
            let id = HandleId(self.next);
            self.calls.lock().push(Call::Create(id));
            Ok(RangingHandle {
                id,
                local_credential: DiscoveryToken::from_bytes(vec![self.next as u8; 4]),
            })
        }
        fn run(&mut self, handle: HandleId, config: &RunConfiguration) -> RangingResult<()> {
            self.calls
                .lock()
                .push(Call::Run(handle, config.peer_credential.clone()));
            Ok(())
        }
        fn invalidate(&mut self, handle: HandleId) {
            self.calls.lock().push(Call::Invalidate(handle));
        }
    }

    fn coordinator() -> (RangingCoordinator, Arc<Mutex<Vec<Call>>>) {
        let engine = Recording::default();
        let calls = engine.calls.clone();
        (RangingCoordinator::new(Box::new(engine)), calls)
    }

    fn peer_token() -> DiscoveryToken {
        DiscoveryToken::from_bytes(vec![0xAB; 4])
    }

    #[test]
    fn test_prepare_reuses_existing_handle() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let first = coordinator.prepare(peer).unwrap();
        let second = coordinator.prepare(peer).unwrap();
        assert_eq!(first, second);
        assert_eq!(*calls.lock(), vec![Call::Create(HandleId(1))]);
        assert_eq!(coordinator.owner(&HandleId(1)), Some(peer));
    }

    #[test]
    fn test_start_ranging_replaces_run() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        coordinator.start_ranging(peer, peer_token()).unwrap();
        let other = DiscoveryToken::from_bytes(vec![0xCD; 4]);
        coordinator.start_ranging(peer, other.clone()).unwrap();

        assert_eq!(
            coordinator.run_configuration(&peer),
            Some(&RunConfiguration::new(other.clone()))
        );
        assert_eq!(calls.lock().last(), Some(&Call::Run(HandleId(1), other)));
    }

    #[test]
    fn test_suspension_end_reruns_known_configuration() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.start_ranging(peer, peer_token()).unwrap();

        let signal = coordinator.handle_event(RangingEvent::SuspensionEnded(handle));
        assert_eq!(signal, Some(RangingSignal::Resumed { peer }));
        assert_eq!(
            calls.lock().last(),
            Some(&Call::Run(handle, peer_token()))
        );
    }

    #[test]
    fn test_suspension_end_without_run_restarts() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.prepare(peer).unwrap().id;

        let signal = coordinator.handle_event(RangingEvent::SuspensionEnded(handle));
        assert_eq!(signal, Some(RangingSignal::RestartHandshake { peer }));
        assert!(coordinator.handle(&peer).is_none());
        assert_eq!(calls.lock().last(), Some(&Call::Invalidate(handle)));
    }

    #[test]
    fn test_invalidation_always_restarts() {
        let (mut coordinator, _calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.start_ranging(peer, peer_token()).unwrap();

        let signal = coordinator.handle_event(RangingEvent::Invalidated {
            handle,
            reason: "engine reset".into(),
        });
        assert_eq!(signal, Some(RangingSignal::RestartHandshake { peer }));
        assert!(coordinator.owner(&handle).is_none());

        // A fresh handle is created on the next prepare
        let next = coordinator.prepare(peer).unwrap();
        assert_ne!(next.id, handle);
    }

    #[test]
    fn test_peer_ended_discards_handle() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.start_ranging(peer, peer_token()).unwrap();

        let signal = coordinator.handle_event(RangingEvent::Removed {
            handle,
            reason: RemovalReason::PeerEnded,
        });
        assert_eq!(signal, Some(RangingSignal::PeerEnded { peer }));
        assert!(coordinator.handle(&peer).is_none());
        assert_eq!(calls.lock().last(), Some(&Call::Invalidate(handle)));

        // Late events for the dead handle are ignored
        assert_eq!(coordinator.handle_event(RangingEvent::Suspended(handle)), None);
    }

    #[test]
    fn test_timeout_reruns_idempotently() {
        let (mut coordinator, calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.start_ranging(peer, peer_token()).unwrap();
        let timeout = RangingEvent::Removed {
            handle,
            reason: RemovalReason::Timeout,
        };

        let first = coordinator.handle_event(timeout.clone());
        let after_first = coordinator.run_configuration(&peer).cloned();
        let second = coordinator.handle_event(timeout);

        assert_eq!(first, Some(RangingSignal::Recovered { peer }));
        assert_eq!(first, second);
        assert_eq!(coordinator.run_configuration(&peer).cloned(), after_first);
        let runs = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Run(h, t) if *h == handle && *t == peer_token()))
            .count();
        assert_eq!(runs, 3);
    }

    #[test]
    fn test_timeout_without_run_is_ignored() {
        let (mut coordinator, _calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.prepare(peer).unwrap().id;
        let signal = coordinator.handle_event(RangingEvent::Removed {
            handle,
            reason: RemovalReason::Timeout,
        });
        assert_eq!(signal, None);
        assert!(coordinator.handle(&peer).is_some());
    }

    #[test]
    fn test_samples_resolve_to_owner() {
        let (mut coordinator, _calls) = coordinator();
        let peer = PeerId::from_seed(1);
        let handle = coordinator.start_ranging(peer, peer_token()).unwrap();
        let sample = RangingSample::distance_only(1.5);

        assert_matches!(
            coordinator.handle_event(RangingEvent::SamplesUpdated {
                handle,
                credential: peer_token(),
                sample,
            }),
            Some(RangingSignal::Sample { peer: p, .. }) if p == peer
        );
        assert_eq!(
            coordinator.handle_event(RangingEvent::SamplesUpdated {
                handle: HandleId(99),
                credential: peer_token(),
                sample,
            }),
            None
        );
    }

    #[test]
    fn test_shutdown_invalidates_everything() {
        let (mut coordinator, calls) = coordinator();
        coordinator.prepare(PeerId::from_seed(1)).unwrap();
        coordinator.prepare(PeerId::from_seed(2)).unwrap();
        coordinator.shutdown();
        let invalidated = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Invalidate(_)))
            .count();
        assert_eq!(invalidated, 2);
        assert!(coordinator.handle(&PeerId::from_seed(1)).is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Prepare(u8),
        Start(u8),
        Discard(u8),
        Suspend(u8),
        EndSuspension(u8),
        Invalidate(u8),
        PeerEnded(u8),
        Timeout(u8),
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        let peer = 0u8..3;
        prop_oneof![
            peer.clone().prop_map(Op::Prepare),
            peer.clone().prop_map(Op::Start),
            peer.clone().prop_map(Op::Discard),
            peer.clone().prop_map(Op::Suspend),
            peer.clone().prop_map(Op::EndSuspension),
            peer.clone().prop_map(Op::Invalidate),
            peer.clone().prop_map(Op::PeerEnded),
            peer.prop_map(Op::Timeout),
        ]
    }

    proptest::proptest! {
        #[test]
        fn prop_handles_and_owners_stay_consistent(ops in proptest::collection::vec(op(), 0..40)) {
            let (mut coordinator, _calls) = coordinator();
            for op in ops {
                let event_for = |c: &RangingCoordinator, seed: u8| {
                    c.handle(&PeerId::from_seed(seed)).map(|h| h.id)
                };
                match op {
                    Op::Prepare(seed) => {
                        coordinator.prepare(PeerId::from_seed(seed)).unwrap();
                    }
                    Op::Start(seed) => {
                        coordinator.start_ranging(PeerId::from_seed(seed), peer_token()).unwrap();
                    }
                    Op::Discard(seed) => {
                        coordinator.discard(PeerId::from_seed(seed));
                    }
                    Op::Suspend(seed) => {
                        if let Some(h) = event_for(&coordinator, seed) {
                            coordinator.handle_event(RangingEvent::Suspended(h));
                        }
                    }
                    Op::EndSuspension(seed) => {
                        if let Some(h) = event_for(&coordinator, seed) {
                            coordinator.handle_event(RangingEvent::SuspensionEnded(h));
                        }
                    }
                    Op::Invalidate(seed) => {
                        if let Some(h) = event_for(&coordinator, seed) {
                            coordinator.handle_event(RangingEvent::Invalidated { handle: h, reason: String::new() });
                        }
                    }
                    Op::PeerEnded(seed) => {
                        if let Some(h) = event_for(&coordinator, seed) {
                            coordinator.handle_event(RangingEvent::Removed { handle: h, reason: RemovalReason::PeerEnded });
                        }
                    }
                    Op::Timeout(seed) => {
                        if let Some(h) = event_for(&coordinator, seed) {
                            coordinator.handle_event(RangingEvent::Removed { handle: h, reason: RemovalReason::Timeout });
                        }
                    }
                }

                proptest::prop_assert_eq!(coordinator.peers.len(), coordinator.owners.len());
                for (handle, peer) in &coordinator.owners {
                    proptest::prop_assert_eq!(coordinator.handle(peer).map(|h| h.id), Some(*handle));
                }
            }
        }
    }

    #[test]
    fn test_engine_errors_propagate() {
        struct Broken;
        impl RangingEngine for Broken {
            fn capability(&self) -> RangingCapability {
                RangingCapability::AccessRequired
            }
            fn create_handle(&mut self) -> RangingResult<RangingHandle> {
                Err(RangingError::AccessRequired)
            }
            fn run(&mut self, handle: HandleId, _: &RunConfiguration) -> RangingResult<()> {
                Err(RangingError::UnknownHandle(handle))
            }
            fn invalidate(&mut self, _: HandleId) {}
        }

        let mut coordinator = RangingCoordinator::new(Box::new(Broken));
        assert_eq!(
            coordinator.prepare(PeerId::from_seed(1)),
            Err(RangingError::AccessRequired)
        );
        assert!(coordinator.handle(&PeerId::from_seed(1)).is_none());
    }
}
