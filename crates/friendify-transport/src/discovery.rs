//! Discovery-time admission
//!
//! A device advertises its service with an identity tag in its discovery
//! info. Browsers only invite peers that advertise the same tag, and both
//! sides refuse new peers once the connected-peer cap is reached.

use friendify_core::TransportConfig;
use std::collections::BTreeMap;

/// Discovery-info key carrying the identity tag
pub const IDENTITY_KEY: &str = "identity";

/// What a device publishes while advertising
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvertisement {
    /// Discovery service name
    pub service_type: String,
    /// Key/value discovery info
    pub discovery_info: BTreeMap<String, String>,
}

impl ServiceAdvertisement {
    /// Identity tag advertised, if any
    pub fn identity(&self) -> Option<&str> {
        self.discovery_info.get(IDENTITY_KEY).map(String::as_str)
    }
}

/// Invitation and acceptance rules for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    service_type: String,
    identity: String,
    max_peers: usize,
}

impl DiscoveryPolicy {
    /// Create a policy
    pub fn new(service_type: impl Into<String>, identity: impl Into<String>, max_peers: usize) -> Self {
        Self {
            service_type: service_type.into(),
            identity: identity.into(),
            max_peers,
        }
    }

    /// Build from transport configuration
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(&config.service_type, &config.identity, config.max_peers)
    }

    /// Connected-peer cap
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Identity tag
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Advertisement for this device
    pub fn advertisement(&self) -> ServiceAdvertisement {
        let mut discovery_info = BTreeMap::new();
        discovery_info.insert(IDENTITY_KEY.to_string(), self.identity.clone());
        ServiceAdvertisement {
            service_type: self.service_type.clone(),
            discovery_info,
        }
    }

    /// Whether a browser should invite a found peer
    pub fn should_invite(&self, found: &ServiceAdvertisement, connected: usize) -> bool {
        found.service_type == self.service_type
            && found.identity() == Some(self.identity.as_str())
            && connected < self.max_peers
    }

    /// Whether an advertiser should accept an invitation
    pub fn should_accept(&self, connected: usize) -> bool {
        connected < self.max_peers
    }
}
