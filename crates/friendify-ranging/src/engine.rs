//! Ranging engine interface

use crate::error::RangingResult;
use friendify_core::{DiscoveryToken, RangingSample};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Whether this device can range at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangingCapability {
    /// Ranging is available
    Supported,
    /// Hardware present, permission missing
    AccessRequired,
    /// No ranging hardware
    Unsupported,
}

/// A freshly created engine session and the credential peers need to range
/// against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangingHandle {
    /// Session identifier
    pub id: HandleId,
    /// Credential to share with the peer
    pub local_credential: DiscoveryToken,
}

/// Parameters of a ranging run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Credential received from the peer
    pub peer_credential: DiscoveryToken,
}

impl RunConfiguration {
    /// Run against `peer_credential`
    pub fn new(peer_credential: DiscoveryToken) -> Self {
        Self { peer_credential }
    }
}

/// Why the engine stopped tracking a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Peer ended its session
    PeerEnded,
    /// No signal for too long
    Timeout,
}

/// Something that happened inside the engine
#[derive(Debug, Clone, PartialEq)]
pub enum RangingEvent {
    /// New measurement for the peer a handle is running against
    SamplesUpdated {
        /// Reporting session
        handle: HandleId,
        /// Credential of the measured peer
        credential: DiscoveryToken,
        /// Measurement
        sample: RangingSample,
    },
    /// Session paused, e.g. app backgrounded
    Suspended(HandleId),
    /// Session may resume
    SuspensionEnded(HandleId),
    /// Session is unusable and must be recreated
    Invalidated {
        /// Dead session
        handle: HandleId,
        /// Engine-provided reason
        reason: String,
    },
    /// Engine stopped tracking the peer
    Removed {
        /// Affected session
        handle: HandleId,
        /// Why
        reason: RemovalReason,
    },
}

impl RangingEvent {
    /// Session the event refers to
    pub fn handle(&self) -> HandleId {
        match self {
            Self::SamplesUpdated { handle, .. }
            | Self::Invalidated { handle, .. }
            | Self::Removed { handle, .. } => *handle,
            Self::Suspended(handle) | Self::SuspensionEnded(handle) => *handle,
        }
    }
}

/// Distance/direction measurement against peers.
///
/// Lifecycle changes are reported asynchronously through the
/// [`EventSink`](friendify_core::EventSink) the engine was built with.
pub trait RangingEngine: Send {
    /// Whether ranging can work on this device
    fn capability(&self) -> RangingCapability;

    /// Create a session, generating its local credential
    fn create_handle(&mut self) -> RangingResult<RangingHandle>;

    /// Start or replace the run of `handle`
    fn run(&mut self, handle: HandleId, config: &RunConfiguration) -> RangingResult<()>;

    /// Tear down `handle`
    fn invalidate(&mut self, handle: HandleId);
}
