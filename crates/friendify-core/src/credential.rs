//! Ranging credentials ("discovery tokens")
//!
//! The ranging engine hands out one token per handle. Two devices can only
//! range against each other once each holds the other's token, so tokens are
//! exchanged over the transport. The bytes are opaque to everything except the
//! engine that minted them.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of tokens minted by [`DiscoveryToken::random`]
pub const DEFAULT_TOKEN_LEN: usize = 32;

/// Opaque ranging credential
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryToken(#[serde(with = "serde_bytes")] Vec<u8>);

impl DiscoveryToken {
    /// Wrap raw engine bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Mint a random token, as a software engine would
    pub fn random() -> Self {
        let mut bytes = vec![0u8; DEFAULT_TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw token bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short hex fingerprint for logs; never the full token
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }
}

impl fmt::Debug for DiscoveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscoveryToken({})", self.fingerprint())
    }
}

impl fmt::Display for DiscoveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}
