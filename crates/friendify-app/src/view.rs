//! Observable UI projections
//!
//! [`AppView`] is the read-only face of the orchestrator. Every field is a
//! `futures-signals` cell, so a front end can either poll the current value or
//! subscribe to changes. Only the orchestrator writes to it.

use friendify_core::{Classification, Direction, DistanceDirectionState, PeerId, SessionState};
use futures_signals::signal::{Mutable, Signal};
use futures_signals::signal_vec::{MutableVec, SignalVec};
use serde::Serialize;

/// Display row for one peer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerSummary {
    /// Peer identifier
    pub id: PeerId,
    /// Advertised name
    pub display_name: String,
    /// Last distance in meters
    pub distance: Option<f32>,
    /// Spatial classification and pointer
    pub classification: Classification,
}

/// Point-in-time copy of everything the view exposes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSnapshot {
    /// Aggregate session state
    pub state: SessionState,
    /// Peers, nearest first
    pub peers: Vec<PeerSummary>,
    /// Classification of the nearest peer
    pub focus: Classification,
    /// Whether our credential has been shared
    pub position_shared: bool,
    /// Chat transcript
    pub chat: Vec<String>,
    /// Diagnostic lines, oldest first
    pub logs: Vec<String>,
}

/// Reactive UI state
#[derive(Clone)]
pub struct AppView {
    state: Mutable<SessionState>,
    peers: MutableVec<PeerSummary>,
    focus: Mutable<Classification>,
    position_shared: Mutable<bool>,
    chat: MutableVec<String>,
    logs: MutableVec<String>,
    max_log_lines: usize,
}

impl std::fmt::Debug for AppView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppView")
            .field("state", &self.state.get())
            .field("peers", &self.peers.lock_ref().len())
            .field("position_shared", &self.position_shared.get())
            .finish_non_exhaustive()
    }
}

impl AppView {
    /// Empty view keeping at most `max_log_lines` diagnostic lines
    pub fn new(max_log_lines: usize) -> Self {
        Self {
            state: Mutable::new(SessionState::Idle),
            peers: MutableVec::new(),
            focus: Mutable::new(Classification::default()),
            position_shared: Mutable::new(false),
            chat: MutableVec::new(),
            logs: MutableVec::new(),
            max_log_lines,
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Aggregate session state
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Signal of the aggregate session state
    pub fn state_signal(&self) -> impl Signal<Item = SessionState> + Send + Sync + 'static {
        self.state.signal()
    }

    /// Peers, nearest first
    pub fn peers(&self) -> Vec<PeerSummary> {
        self.peers.lock_ref().to_vec()
    }

    /// Signal of the ordered peer list
    pub fn peers_signal(&self) -> impl SignalVec<Item = PeerSummary> + Send + Sync + 'static {
        self.peers.signal_vec_cloned()
    }

    /// Classification of the nearest peer; `unknown` with no peers
    pub fn focus(&self) -> Classification {
        self.focus.get()
    }

    /// Signal of the nearest peer's classification
    pub fn focus_signal(&self) -> impl Signal<Item = Classification> + Send + Sync + 'static {
        self.focus.signal()
    }

    /// Spatial state of the nearest peer
    pub fn distance_direction_state(&self) -> DistanceDirectionState {
        self.focus.get().state
    }

    /// Pointer rotation in radians
    pub fn rotation_angle(&self) -> f32 {
        self.focus.get().orientation.rotation_angle
    }

    /// Left/right indicator
    pub fn azimuth(&self) -> Option<Direction> {
        self.focus.get().orientation.azimuth
    }

    /// Up/down indicator
    pub fn elevation(&self) -> Option<Direction> {
        self.focus.get().orientation.elevation
    }

    /// Whether our credential has been shared with a peer
    pub fn position_shared(&self) -> bool {
        self.position_shared.get()
    }

    /// Signal of the position-shared flag
    pub fn position_shared_signal(&self) -> impl Signal<Item = bool> + Send + Sync + 'static {
        self.position_shared.signal()
    }

    /// Chat transcript
    pub fn chat(&self) -> Vec<String> {
        self.chat.lock_ref().to_vec()
    }

    /// Signal of the chat transcript
    pub fn chat_signal(&self) -> impl SignalVec<Item = String> + Send + Sync + 'static {
        self.chat.signal_vec_cloned()
    }

    /// Diagnostic lines, oldest first
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock_ref().to_vec()
    }

    /// Signal of the diagnostic lines
    pub fn logs_signal(&self) -> impl SignalVec<Item = String> + Send + Sync + 'static {
        self.logs.signal_vec_cloned()
    }

    /// Copy everything
    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            state: self.state(),
            peers: self.peers(),
            focus: self.focus(),
            position_shared: self.position_shared(),
            chat: self.chat(),
            logs: self.logs(),
        }
    }

    // ------------------------------------------------------------------------
    // Writes (orchestrator only)
    // ------------------------------------------------------------------------

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.set_neq(state);
    }

    pub(crate) fn set_position_shared(&self, shared: bool) {
        self.position_shared.set_neq(shared);
    }

    /// Replace the peer list and focus together
    pub(crate) fn publish(&self, peers: Vec<PeerSummary>, focus: Classification) {
        self.peers.lock_mut().replace_cloned(peers);
        self.focus.set_neq(focus);
    }

    pub(crate) fn push_chat(&self, line: String) {
        self.chat.lock_mut().push_cloned(line);
    }

    pub(crate) fn push_log(&self, line: String) {
        let mut logs = self.logs.lock_mut();
        logs.push_cloned(line);
        let excess = logs.len().saturating_sub(self.max_log_lines);
        for _ in 0..excess {
            logs.remove(0);
        }
    }
}

impl Default for AppView {
    fn default() -> Self {
        Self::new(friendify_core::config::DEFAULT_MAX_LOG_LINES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures_signals::signal::SignalExt;

    #[test]
    fn test_logs_are_bounded() {
        let view = AppView::new(3);
        for n in 0..5 {
            view.push_log(format!("line {n}"));
        }
        assert_eq!(view.logs(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_empty_view_focus_is_neutral() {
        let view = AppView::default();
        assert_eq!(view.state(), SessionState::Idle);
        assert_eq!(view.rotation_angle(), 0.0);
        assert_eq!(view.azimuth(), None);
        assert_eq!(view.distance_direction_state(), DistanceDirectionState::Unknown);
    }

    #[tokio::test]
    async fn test_state_signal_follows_changes() {
        let view = AppView::default();
        let mut states = view.state_signal().to_stream();
        assert_eq!(states.next().await, Some(SessionState::Idle));

        view.set_state(SessionState::Discovering);
        assert_eq!(states.next().await, Some(SessionState::Discovering));
    }

    #[test]
    fn test_snapshot_copies_everything() {
        let view = AppView::default();
        view.set_position_shared(true);
        view.push_chat("You: hi".into());
        let snapshot = view.snapshot();
        assert!(snapshot.position_shared);
        assert_eq!(snapshot.chat, vec!["You: hi"]);
        assert!(snapshot.peers.is_empty());
    }
}
