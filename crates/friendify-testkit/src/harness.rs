//! Synchronous orchestrator harness
//!
//! [`Harness`] wires a [`SessionOrchestrator`] to a [`MockTransport`] and a
//! [`MockRangingEngine`], then lets a test play the part of both
//! collaborators. Every injected event is applied immediately, followed by
//! anything the orchestrator queued for itself (such as send failures), so
//! assertions always see a settled state.
//!
//! A configuration with `display.update_policy` needs a Tokio runtime current
//! while the harness is built; the limiter's tasks run on that runtime.

use crate::fixtures;
use crate::mocks::{MockRangingEngine, MockTransport, RangingLog, TransportLog};
use crate::strategies::Step;
use friendify_app::{AppResult, AppView, Command, Inbound, Inbox, PeerSession, SessionOrchestrator};
use friendify_core::{EventSink, FriendifyConfig, PeerId, RangingSample};
use friendify_ranging::{HandleId, RangingCapability, RangingEvent, RemovalReason};
use friendify_transport::{encode_credential, PeerTransport, TransportEvent, WireMessage};
use tokio::sync::mpsc::UnboundedReceiver;

/// Orchestrator driven by hand
pub struct Harness {
    orchestrator: SessionOrchestrator,
    rx: UnboundedReceiver<Inbound>,
    transport: TransportLog,
    ranging: RangingLog,
    local: PeerId,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("local", &self.local)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Supported device with room for four peers
    pub fn new() -> Self {
        Self::with_config(fixtures::config(4), RangingCapability::Supported)
    }

    /// Device with a specific ranging capability
    pub fn with_capability(capability: RangingCapability) -> Self {
        Self::with_config(fixtures::config(4), capability)
    }

    /// Device built from `config`
    pub fn with_config(config: FriendifyConfig, capability: RangingCapability) -> Self {
        Self::try_with_config(config, capability).expect("fixture configuration is valid")
    }

    /// Device built from `config`, surfacing construction errors
    pub fn try_with_config(
        config: FriendifyConfig,
        capability: RangingCapability,
    ) -> AppResult<Self> {
        let local = fixtures::peer(fixtures::LOCAL_SEED);
        let transport = TransportLog::default();
        let (engine, ranging) = MockRangingEngine::with_capability(capability);
        let (inbox, rx) = Inbox::new();

        let log = transport.clone();
        let factory = move |_sink: EventSink<TransportEvent>| -> Box<dyn PeerTransport> {
            Box::new(MockTransport::with_log(local, log.clone()))
        };
        let orchestrator = SessionOrchestrator::new(&config, factory, Box::new(engine), inbox)?;

        Ok(Self {
            orchestrator,
            rx,
            transport,
            ranging,
            local,
        })
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// The orchestrator under test
    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    /// UI projections
    pub fn view(&self) -> AppView {
        self.orchestrator.view()
    }

    /// Transport call log
    pub fn transport(&self) -> &TransportLog {
        &self.transport
    }

    /// Engine call log
    pub fn ranging(&self) -> &RangingLog {
        &self.ranging
    }

    /// Local device identifier
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Session for `peer(seed)`
    pub fn session(&self, seed: u8) -> Option<&PeerSession> {
        self.orchestrator.session(&fixtures::peer(seed))
    }

    /// Handle the ranging coordinator holds for `peer(seed)`
    pub fn handle_of(&self, seed: u8) -> Option<HandleId> {
        self.orchestrator
            .ranging()
            .handle(&fixtures::peer(seed))
            .map(|handle| handle.id)
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Apply `inbound`, then everything it queued. Returns `false` after a
    /// shutdown.
    pub fn dispatch(&mut self, inbound: Inbound) -> bool {
        let running = self.orchestrator.handle(inbound);
        self.pump();
        running
    }

    /// Apply queued events until the channel is empty
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(inbound) = self.rx.try_recv() {
            self.orchestrator.handle(inbound);
            handled += 1;
        }
        handled
    }

    /// User asks to connect
    pub fn connect(&mut self) {
        self.dispatch(Inbound::Command(Command::ConnectRequested));
    }

    /// User sends chat text
    pub fn send_message(&mut self, text: &str) -> AppResult<usize> {
        let result = self.orchestrator.send_message(text);
        self.pump();
        result
    }

    /// Transport reports `peer(seed)` connected
    pub fn peer_connected(&mut self, seed: u8) {
        self.transport_event(TransportEvent::Connected {
            peer: fixtures::peer(seed),
            display_name: fixtures::peer_name(seed),
        });
    }

    /// Transport reports `peer(seed)` disconnected
    pub fn peer_disconnected(&mut self, seed: u8) {
        self.transport_event(TransportEvent::Disconnected {
            peer: fixtures::peer(seed),
        });
    }

    /// `peer(seed)` sends its fixture credential
    pub fn receive_credential(&mut self, seed: u8) {
        let payload = encode_credential(&fixtures::peer_credential(seed))
            .expect("fixture credential encodes");
        self.receive(seed, payload);
    }

    /// `peer(seed)` sends chat text
    pub fn receive_text(&mut self, seed: u8, text: &str) {
        let payload = WireMessage::Text(text.to_string())
            .encode()
            .expect("text encodes");
        self.receive(seed, payload);
    }

    /// `peer(seed)` sends raw bytes
    pub fn receive(&mut self, seed: u8, payload: Vec<u8>) {
        self.transport_event(TransportEvent::DataReceived {
            peer: fixtures::peer(seed),
            payload,
        });
    }

    /// Inject a transport event
    pub fn transport_event(&mut self, event: TransportEvent) {
        self.dispatch(Inbound::Transport(event));
    }

    /// Inject an engine event
    pub fn ranging_event(&mut self, event: RangingEvent) {
        self.dispatch(Inbound::Ranging(event));
    }

    /// Engine reports `sample` on `peer(seed)`'s handle, measured against the
    /// peer's fixture credential. Returns `false` when the peer has no handle.
    pub fn sample(&mut self, seed: u8, sample: RangingSample) -> bool {
        self.with_handle(seed, |handle| RangingEvent::SamplesUpdated {
            handle,
            credential: fixtures::peer_credential(seed),
            sample,
        })
    }

    /// Engine suspends `peer(seed)`'s handle
    pub fn suspend(&mut self, seed: u8) -> bool {
        self.with_handle(seed, RangingEvent::Suspended)
    }

    /// Engine ends the suspension of `peer(seed)`'s handle
    pub fn end_suspension(&mut self, seed: u8) -> bool {
        self.with_handle(seed, RangingEvent::SuspensionEnded)
    }

    /// Engine removes `peer(seed)`'s handle after a timeout
    pub fn timeout(&mut self, seed: u8) -> bool {
        self.with_handle(seed, |handle| RangingEvent::Removed {
            handle,
            reason: RemovalReason::Timeout,
        })
    }

    /// Engine invalidates `peer(seed)`'s handle
    pub fn invalidate(&mut self, seed: u8) -> bool {
        self.with_handle(seed, |handle| RangingEvent::Invalidated {
            handle,
            reason: "engine reset".to_string(),
        })
    }

    /// `peer(seed)` ended its ranging session
    pub fn peer_ended(&mut self, seed: u8) -> bool {
        self.with_handle(seed, |handle| RangingEvent::Removed {
            handle,
            reason: RemovalReason::PeerEnded,
        })
    }

    /// Apply a generated step
    pub fn apply(&mut self, step: &Step) {
        match step {
            Step::ConnectRequested => self.connect(),
            Step::Connect(seed) => self.peer_connected(*seed),
            Step::Disconnect(seed) => self.peer_disconnected(*seed),
            Step::Credential(seed) => self.receive_credential(*seed),
            Step::Text(seed, text) => self.receive_text(*seed, text),
            Step::Sample(seed, sample) => {
                self.sample(*seed, *sample);
            }
            Step::Suspend(seed) => {
                self.suspend(*seed);
            }
            Step::EndSuspension(seed) => {
                self.end_suspension(*seed);
            }
            Step::Timeout(seed) => {
                self.timeout(*seed);
            }
            Step::Invalidate(seed) => {
                self.invalidate(*seed);
            }
            Step::PeerEnded(seed) => {
                self.peer_ended(*seed);
            }
        }
    }

    /// Tear the orchestrator down
    pub fn shutdown(&mut self) -> bool {
        self.dispatch(Inbound::Shutdown)
    }

    fn with_handle(&mut self, seed: u8, event: impl FnOnce(HandleId) -> RangingEvent) -> bool {
        let Some(handle) = self.handle_of(seed) else {
            return false;
        };
        self.ranging_event(event(handle));
        true
    }
}
