//! Peer identifiers
//!
//! A [`PeerId`] is assigned by the transport when a peer connects and stays
//! stable for the lifetime of that connection. Every piece of per-peer state
//! is keyed by it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, transport-assigned identifier for a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Generate a fresh random peer identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a peer ID from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Deterministic peer ID for tests and simulations
    pub fn from_seed(seed: u8) -> Self {
        Self(Uuid::from_bytes([seed; 16]))
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex characters, used in log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.short())
    }
}

impl From<Uuid> for PeerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
