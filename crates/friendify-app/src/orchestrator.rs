//! Session orchestrator
//!
//! The single owner of the peer table and the aggregate session state. Both
//! collaborators (transport and ranging engine) report through an [`Inbox`]
//! into one channel, and [`SessionOrchestrator::handle`] applies each event in
//! arrival order, so no state here needs locking.
//!
//! Peer lifecycle:
//!
//! 1. transport reports the peer connected: a session and a ranging handle are
//!    created, and our credential is sent once
//! 2. the peer's credential arrives: a ranging run is issued with it
//! 3. samples arrive: distance and classification are updated, the ordered
//!    view is re-sorted and the UI is notified
//! 4. the peer disconnects or ends ranging: the session is destroyed

use crate::errors::{AppError, AppResult};
use crate::session::{PeerSession, PeerTable};
use crate::view::{AppView, PeerSummary};
use friendify_core::{
    Classification, DiscoveryToken, DistanceDirectionState, EventSink, FriendifyConfig, Limiter,
    PeerId, RangingClassifier, SessionState,
};
use friendify_ranging::{
    RangingCapability, RangingCoordinator, RangingEngine, RangingEvent, RangingSignal,
};
use friendify_transport::{
    encode_credential, DiscoveryPhase, PeerTransport, TransportCoordinator, TransportEvent,
    WireMessage,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ============================================================================
// Inbound events
// ============================================================================

/// User commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start discovery, or finish the handshake with connected peers
    ConnectRequested,
    /// Send a chat message to every connected peer
    SendMessage(String),
}

/// Everything the orchestrator reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Transport event
    Transport(TransportEvent),
    /// Ranging engine event
    Ranging(RangingEvent),
    /// User command
    Command(Command),
    /// Tear everything down and stop
    Shutdown,
}

/// Sender side of the orchestrator's channel
#[derive(Debug, Clone)]
pub struct Inbox {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl Inbox {
    /// New inbox and the receiver the orchestrator drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sink for a transport
    pub fn transport_sink(&self) -> EventSink<TransportEvent> {
        EventSink::new(self.tx.clone(), Inbound::Transport)
    }

    /// Sink for a ranging engine
    pub fn ranging_sink(&self) -> EventSink<RangingEvent> {
        EventSink::new(self.tx.clone(), Inbound::Ranging)
    }

    /// Queue a user command. Returns `false` once the orchestrator is gone.
    pub fn command(&self, command: Command) -> bool {
        self.tx.send(Inbound::Command(command)).is_ok()
    }

    /// Ask the orchestrator to stop
    pub fn shutdown(&self) -> bool {
        self.tx.send(Inbound::Shutdown).is_ok()
    }
}

// ============================================================================
// Transport factory
// ============================================================================

/// Creates the transport on first connect
pub trait TransportFactory: Send {
    /// Build a transport reporting into `sink`
    fn create(&mut self, sink: EventSink<TransportEvent>) -> Box<dyn PeerTransport>;
}

impl<F> TransportFactory for F
where
    F: FnMut(EventSink<TransportEvent>) -> Box<dyn PeerTransport> + Send,
{
    fn create(&mut self, sink: EventSink<TransportEvent>) -> Box<dyn PeerTransport> {
        self(sink)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Peer lifecycle state machine
pub struct SessionOrchestrator {
    display_name: String,
    max_peers: usize,
    classifier: RangingClassifier,
    inbox: Inbox,
    transport_factory: Box<dyn TransportFactory>,
    transport: Option<TransportCoordinator>,
    ranging: RangingCoordinator,
    peers: PeerTable,
    state: SessionState,
    view: AppView,
    limiter: Option<Limiter>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("display_name", &self.display_name)
            .field("state", &self.state)
            .field("peers", &self.peers.len())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Build an orchestrator. The engine must report into
    /// `inbox.ranging_sink()`.
    ///
    /// When `display.update_policy` is set, sample publishing is scheduled on
    /// the Tokio runtime current at this call, and building outside one fails
    /// with [`AppError::RuntimeRequired`]. Afterwards [`handle`](Self::handle)
    /// may be driven from any thread.
    pub fn new(
        config: &FriendifyConfig,
        transport_factory: impl TransportFactory + 'static,
        engine: Box<dyn RangingEngine>,
        inbox: Inbox,
    ) -> AppResult<Self> {
        config.validate()?;
        let limiter = match config.display.update_window() {
            Some((policy, interval)) => {
                let runtime =
                    Handle::try_current().map_err(|_| AppError::RuntimeRequired { policy })?;
                Some(Limiter::new(policy, interval, runtime))
            }
            None => None,
        };
        Ok(Self {
            display_name: config.device.display_name.clone(),
            max_peers: config.transport.max_peers,
            classifier: RangingClassifier::new(config.ranging.near_threshold_m),
            inbox,
            transport_factory: Box::new(transport_factory),
            transport: None,
            ranging: RangingCoordinator::new(engine),
            peers: PeerTable::new(),
            state: SessionState::Idle,
            view: AppView::new(config.display.max_log_lines),
            limiter,
        })
    }

    /// Aggregate session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// UI projections
    pub fn view(&self) -> AppView {
        self.view.clone()
    }

    /// Peer sessions
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Session for `peer`
    pub fn session(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.peers.get(peer)
    }

    /// Transport coordinator, once started
    pub fn transport(&self) -> Option<&TransportCoordinator> {
        self.transport.as_ref()
    }

    /// Ranging coordinator
    pub fn ranging(&self) -> &RangingCoordinator {
        &self.ranging
    }

    /// Local transport identifier, once started
    pub fn local_peer(&self) -> Option<PeerId> {
        self.transport.as_ref().map(TransportCoordinator::local_peer)
    }

    /// Apply one inbound event. Returns `false` after [`Inbound::Shutdown`].
    pub fn handle(&mut self, inbound: Inbound) -> bool {
        match inbound {
            Inbound::Transport(event) => self.on_transport(event),
            Inbound::Ranging(event) => self.on_ranging(event),
            Inbound::Command(Command::ConnectRequested) => self.connect(),
            Inbound::Command(Command::SendMessage(text)) => {
                if let Err(error) = self.send_message(&text) {
                    self.report(&error);
                }
            }
            Inbound::Shutdown => {
                self.teardown();
                return false;
            }
        }
        true
    }

    /// Drain `rx` until shutdown or until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Inbound>) {
        info!(device = %self.display_name, "Session orchestrator running");
        while let Some(inbound) = rx.recv().await {
            if !self.handle(inbound) {
                return;
            }
        }
        self.teardown();
    }

    /// Run on a new task
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<Inbound>) -> OrchestratorHandle {
        let inbox = self.inbox.clone();
        let view = self.view.clone();
        let task = tokio::spawn(self.run(rx));
        OrchestratorHandle { inbox, view, task }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Startup protocol. Safe to call repeatedly: the transport is created and
    /// started once, and every connected peer gets its handshake completed.
    pub fn connect(&mut self) {
        if self.transport.is_none() {
            self.cold_start();
            return;
        }

        let phase = self.transport.as_mut().map(|transport| {
            transport.start();
            transport.phase()
        });
        let peers: Vec<PeerId> = self.peers.order().to_vec();
        if peers.is_empty() {
            if phase == Some(DiscoveryPhase::Active) {
                self.set_state(SessionState::Discovering);
            } else {
                debug!(phase = ?phase, "Discovery not active, state unchanged");
            }
            return;
        }
        for peer in peers {
            self.resume_handshake(peer);
        }
    }

    /// Send chat text to every connected peer and append it to the
    /// transcript. Returns how many peers were targeted.
    pub fn send_message(&mut self, text: &str) -> AppResult<usize> {
        if text.is_empty() {
            return Err(AppError::Input("message is empty".to_string()));
        }
        let transport = self.transport.as_mut().ok_or(AppError::NotStarted)?;
        let payload = WireMessage::Text(text.to_string())
            .encode()
            .map_err(|source| AppError::Input(source.to_string()))?;

        let targeted = transport.broadcast(&payload);
        self.view.push_chat(format!("You: {text}"));
        debug!(peers = targeted, bytes = payload.len(), "Chat message sent");
        Ok(targeted)
    }

    fn cold_start(&mut self) {
        match self.ranging.capability() {
            RangingCapability::Supported => {}
            RangingCapability::AccessRequired => {
                self.enter_capability_state(SessionState::AccessRequired)
            }
            RangingCapability::Unsupported => self.enter_capability_state(SessionState::Unsupported),
        }

        let sink = self.inbox.transport_sink();
        let transport = self.transport_factory.create(sink.clone());
        let mut coordinator = TransportCoordinator::new(transport, self.max_peers, sink);
        coordinator.start();
        info!(device = %self.display_name, local = %coordinator.local_peer(), "Transport created");
        self.transport = Some(coordinator);

        self.set_state(SessionState::Discovering);
        self.diag(format!("{} is discovering peers", self.display_name));
        self.publish_now();
    }

    /// Make sure `peer` has a handle, our credential has been sent once, and
    /// a run is issued if the peer's credential is known
    fn resume_handshake(&mut self, peer: PeerId) {
        match self.ranging.prepare(peer) {
            Ok(handle) => {
                if let Some(session) = self.peers.get_mut(&peer) {
                    session.attach_handle(&handle);
                }
            }
            Err(error) => {
                self.report(&AppError::Ranging(error));
                return;
            }
        }

        self.share_credential(peer);

        let known = self
            .peers
            .get(&peer)
            .and_then(|session| session.peer_credential.clone());
        if let Some(credential) = known {
            if let Err(error) = self.ranging.start_ranging(peer, credential) {
                self.report(&AppError::Ranging(error));
                return;
            }
            self.diag(format!("{} ran ranging session with {}", self.display_name, self.name_of(&peer)));
        }
    }

    fn share_credential(&mut self, peer: PeerId) {
        let Some(session) = self.peers.get(&peer) else {
            return;
        };
        if !session.needs_share() {
            return;
        }
        let Some(credential) = session.local_credential.clone() else {
            return;
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let payload = match encode_credential(&credential) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(peer = %peer, error = %error, "Failed to encode credential");
                return;
            }
        };
        transport.send_to(&payload, &[peer]);

        if let Some(session) = self.peers.get_mut(&peer) {
            session.credential_shared = true;
        }
        self.view.set_position_shared(true);
        info!(peer = %peer, credential = %credential, "Shared ranging credential");
        self.diag(format!(
            "{} shared discovery token with {}",
            self.display_name,
            self.name_of(&peer)
        ));
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    fn on_transport(&mut self, event: TransportEvent) {
        if let Some(transport) = self.transport.as_mut() {
            transport.observe(&event);
        }

        match event {
            TransportEvent::Connected { peer, display_name } => {
                self.on_peer_connected(peer, display_name)
            }
            TransportEvent::Disconnected { peer } => self.on_peer_disconnected(peer),
            TransportEvent::Connecting { peer } => {
                self.diag(format!("{} is connecting to {}", self.display_name, peer));
                self.set_state(SessionState::Connecting);
            }
            TransportEvent::UnknownState { peer } => {
                debug!(peer = %peer, "Transport reported unknown peer state");
                self.diag(format!("{} is in unknown state with {}", self.display_name, self.name_of(&peer)));
            }
            TransportEvent::LostPeer { peer } => {
                debug!(peer = %peer, "Transport lost peer");
                self.diag(format!("{} lost peer {}", self.display_name, peer));
            }
            TransportEvent::DataReceived { peer, payload } => self.on_data(peer, &payload),
            TransportEvent::SendFailed { peers, error } => {
                warn!(peers = peers.len(), error = %error, "Transport send failed");
                for peer in peers {
                    self.diag(format!("Error sending data to {}: {error}", self.name_of(&peer)));
                }
            }
        }
    }

    fn on_peer_connected(&mut self, peer: PeerId, display_name: String) {
        if self.peers.contains(&peer) {
            debug!(peer = %peer, "Duplicate connect ignored");
            return;
        }

        info!(peer = %peer, name = %display_name, "Peer connected");
        self.diag(format!("{} did connect to peer {}", self.display_name, display_name));
        self.peers.insert(PeerSession::new(peer, display_name));

        self.resume_handshake(peer);
        self.set_state(SessionState::Connected);
        self.publish_now();
    }

    fn on_peer_disconnected(&mut self, peer: PeerId) {
        let name = self.name_of(&peer);
        if self.peers.remove(&peer).is_some() {
            self.ranging.discard(peer);
        }
        info!(peer = %peer, "Peer disconnected");
        self.diag(format!("{} did disconnect from peer {}", self.display_name, name));

        self.set_state(SessionState::PeerEnded);
        self.view.set_position_shared(false);
        self.publish_now();
    }

    fn on_data(&mut self, peer: PeerId, payload: &[u8]) {
        match WireMessage::decode(payload) {
            Ok(WireMessage::Credential(credential)) => self.on_credential(peer, credential),
            Ok(WireMessage::Text(text)) => {
                if text.is_empty() {
                    return;
                }
                let name = self.name_of(&peer);
                self.diag(format!("{} did receive message from {}", self.display_name, name));
                self.view.push_chat(format!("{name}: {text}"));
            }
            Err(source) => {
                if let Some(session) = self.peers.get_mut(&peer) {
                    session.protocol_violations += 1;
                }
                self.report(&AppError::Protocol { peer, source });
            }
        }
    }

    fn on_credential(&mut self, peer: PeerId, credential: DiscoveryToken) {
        if !self.peers.contains(&peer) {
            warn!(peer = %peer, "Credential from peer without a session dropped");
            return;
        }
        self.diag(format!(
            "{} shared discovery token with {}",
            self.name_of(&peer),
            self.display_name
        ));

        let handle = match self.ranging.start_ranging(peer, credential.clone()) {
            Ok(handle) => handle,
            Err(error) => {
                self.report(&AppError::Ranging(error));
                return;
            }
        };

        // start_ranging creates a handle if the peer had none
        if let Some(ranging_handle) = self.ranging.handle(&peer).cloned() {
            if let Some(session) = self.peers.get_mut(&peer) {
                session.attach_handle(&ranging_handle);
                session.peer_credential = Some(credential);
            }
        }
        debug!(peer = %peer, handle = %handle, "Ranging run issued from received credential");
        self.share_credential(peer);
        self.diag(format!("{} ran ranging session with {}", self.display_name, self.name_of(&peer)));
    }

    // ------------------------------------------------------------------------
    // Ranging events
    // ------------------------------------------------------------------------

    fn on_ranging(&mut self, event: RangingEvent) {
        let Some(signal) = self.ranging.handle_event(event) else {
            return;
        };

        match signal {
            RangingSignal::Sample {
                peer,
                credential,
                sample,
            } => {
                let matches = self
                    .peers
                    .get(&peer)
                    .map(|session| session.peer_credential.as_ref() == Some(&credential))
                    .unwrap_or(false);
                if !matches {
                    debug!(peer = %peer, "Sample for a stale credential dropped");
                    return;
                }
                if let Some(session) = self.peers.record_sample(&peer, &sample, &self.classifier) {
                    debug!(
                        peer = %peer,
                        distance = ?session.last_distance,
                        state = %session.classification.state,
                        "Ranging sample"
                    );
                }
                self.publish_sample();
            }
            RangingSignal::Suspended { peer } => {
                if let Some(session) = self.peers.get_mut(&peer) {
                    session.classification.state = DistanceDirectionState::Unknown;
                }
                self.diag("Ranging session suspended".to_string());
                self.set_state(SessionState::Suspended);
                self.publish_now();
            }
            RangingSignal::Resumed { peer } | RangingSignal::Recovered { peer } => {
                self.diag(format!("Ranging with {} resumed", self.name_of(&peer)));
                if self.peers.contains(&peer) {
                    self.set_state(SessionState::Connected);
                }
            }
            RangingSignal::RestartHandshake { peer } => {
                self.diag("Ranging session invalidated".to_string());
                if let Some(session) = self.peers.get_mut(&peer) {
                    session.detach_handle();
                } else {
                    return;
                }
                self.resume_handshake(peer);
                self.set_state(SessionState::Connected);
                self.publish_now();
            }
            RangingSignal::PeerEnded { peer } => {
                let name = self.name_of(&peer);
                self.peers.remove(&peer);
                // The link may stay up, but the peer no longer holds a slot
                if let Some(transport) = self.transport.as_mut() {
                    transport.forget(&peer);
                }
                info!(peer = %peer, "Peer ended ranging session");
                self.diag(format!("{name} ended the ranging session"));
                self.set_state(SessionState::PeerEnded);
                self.view.set_position_shared(false);
                self.publish_now();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn teardown(&mut self) {
        if let Some(limiter) = &self.limiter {
            limiter.cancel();
        }
        self.ranging.shutdown();
        if let Some(transport) = self.transport.as_mut() {
            transport.invalidate();
        }
        self.peers.clear();
        self.view.set_position_shared(false);
        self.publish_now();
        info!(device = %self.display_name, "Session orchestrator stopped");
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            debug!(state = ?self.state, ignored = ?next, "Capability state is sticky");
            return;
        }
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Session state changed");
        }
        self.state = next;
        self.view.set_state(next);
    }

    fn enter_capability_state(&mut self, state: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        warn!(state = ?state, "Ranging unavailable");
        self.state = state;
        self.view.set_state(state);
        self.diag(state.label().to_string());
    }

    fn report(&mut self, error: &AppError) {
        if let Some(state) = error.session_state() {
            self.enter_capability_state(state);
            return;
        }
        warn!(category = %error.category(), error = %error, "Operation failed");
        self.diag(format!("{error} ({})", error.resolution_hint()));
    }

    fn diag(&self, line: String) {
        self.view.push_log(line);
    }

    fn name_of(&self, peer: &PeerId) -> String {
        self.peers
            .get(peer)
            .map(|session| session.display_name.clone())
            .or_else(|| {
                self.transport
                    .as_ref()
                    .and_then(|transport| transport.display_name(peer))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| peer.to_string())
    }

    fn projection(&self) -> (Vec<PeerSummary>, Classification) {
        let rows = self
            .peers
            .ordered()
            .map(|session| PeerSummary {
                id: session.id,
                display_name: session.display_name.clone(),
                distance: session.last_distance,
                classification: session.classification,
            })
            .collect();
        let focus = self
            .peers
            .nearest()
            .map(|session| session.classification)
            .unwrap_or_default();
        (rows, focus)
    }

    fn publish_now(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.cancel();
        }
        let (rows, focus) = self.projection();
        self.view.publish(rows, focus);
    }

    fn publish_sample(&self) {
        let (rows, focus) = self.projection();
        match &self.limiter {
            None => self.view.publish(rows, focus),
            Some(limiter) => {
                let view = self.view.clone();
                limiter.submit(async move { view.publish(rows, focus) });
            }
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to an orchestrator running on its own task
#[derive(Debug)]
pub struct OrchestratorHandle {
    inbox: Inbox,
    view: AppView,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    /// UI projections
    pub fn view(&self) -> &AppView {
        &self.view
    }

    /// Inbox feeding the orchestrator
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Request a connection
    pub fn connect(&self) -> bool {
        self.inbox.command(Command::ConnectRequested)
    }

    /// Send a chat message
    pub fn send_message(&self, text: impl Into<String>) -> bool {
        self.inbox.command(Command::SendMessage(text.into()))
    }

    /// Stop the orchestrator and wait for it to finish
    pub async fn shutdown(self) {
        self.inbox.shutdown();
        if let Err(error) = self.task.await {
            warn!(error = %error, "Orchestrator task failed");
        }
    }
}
