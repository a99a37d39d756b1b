//! # Friendify Transport
//!
//! The boundary to the local wireless transport:
//! - [`PeerTransport`] and [`TransportEvent`], the collaborator interface
//! - [`TransportCoordinator`], which owns the transport and keeps discovery
//!   within the connected-peer cap
//! - [`DiscoveryPolicy`], identity-tag filtering and capacity admission
//! - [`WireMessage`], the credential/text wire format
//! - [`MemoryNetwork`], an in-process transport for tests and simulation

pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod events;
pub mod memory;
pub mod traits;
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{DiscoveryPhase, TransportCoordinator};
pub use discovery::{DiscoveryPolicy, ServiceAdvertisement, IDENTITY_KEY};
pub use error::{TransportError, TransportResult, WireError};
pub use events::TransportEvent;
pub use memory::{MemoryNetwork, MemoryTransport};
pub use traits::PeerTransport;
pub use wire::{encode_credential, CredentialRecord, WireMessage, CREDENTIAL_MAGIC, WIRE_VERSION};
