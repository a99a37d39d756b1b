//! Property test strategies
//!
//! [`arb_step`] generates one orchestrator input at a time, drawn from a
//! small pool of peers so that connects, credentials, samples and faults
//! collide often. Feed sequences of them through
//! [`Harness::apply`](crate::Harness::apply).

use crate::fixtures;
use friendify_core::{DiscoveryToken, PeerId, RangingSample, Vector3};
use proptest::prelude::*;

// Re-export proptest for convenience
pub use proptest;

/// Peer seeds used by generated steps
pub const PEER_SEEDS: std::ops::RangeInclusive<u8> = 1..=4;

/// Strategy for peers from the shared pool
pub fn arb_peer_seed() -> impl Strategy<Value = u8> {
    PEER_SEEDS
}

/// Strategy for peer identifiers from the shared pool
pub fn arb_peer_id() -> impl Strategy<Value = PeerId> {
    arb_peer_seed().prop_map(fixtures::peer)
}

/// Strategy for opaque credentials
pub fn arb_token() -> impl Strategy<Value = DiscoveryToken> {
    proptest::collection::vec(any::<u8>(), 1..48).prop_map(DiscoveryToken::from_bytes)
}

/// Strategy for unit direction vectors
pub fn arb_direction() -> impl Strategy<Value = Vector3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
        .prop_filter("non-zero", |(x, y, z)| x * x + y * y + z * z > 1e-3)
        .prop_map(|(x, y, z)| Vector3::new(x, y, z).normalized())
}

/// Strategy for raw samples, including the no-fix case
pub fn arb_sample() -> impl Strategy<Value = RangingSample> {
    (
        proptest::option::of(0.0f32..12.0),
        proptest::option::of(arb_direction()),
    )
        .prop_map(|(distance, direction)| RangingSample {
            distance,
            direction,
        })
}

/// One orchestrator input
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// User asks to connect
    ConnectRequested,
    /// Transport reports the peer connected
    Connect(u8),
    /// Transport reports the peer disconnected
    Disconnect(u8),
    /// Peer sends its credential
    Credential(u8),
    /// Peer sends chat text
    Text(u8, String),
    /// Engine reports a sample for the peer's handle
    Sample(u8, RangingSample),
    /// Engine suspends the peer's handle
    Suspend(u8),
    /// Engine ends the suspension
    EndSuspension(u8),
    /// Engine removes the handle after a timeout
    Timeout(u8),
    /// Engine invalidates the handle
    Invalidate(u8),
    /// Peer ended its ranging session
    PeerEnded(u8),
}

/// Strategy for a single step
pub fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::ConnectRequested),
        4 => arb_peer_seed().prop_map(Step::Connect),
        2 => arb_peer_seed().prop_map(Step::Disconnect),
        4 => arb_peer_seed().prop_map(Step::Credential),
        1 => (arb_peer_seed(), "[a-z ]{0,12}").prop_map(|(seed, text)| Step::Text(seed, text)),
        6 => (arb_peer_seed(), arb_sample()).prop_map(|(seed, sample)| Step::Sample(seed, sample)),
        1 => arb_peer_seed().prop_map(Step::Suspend),
        1 => arb_peer_seed().prop_map(Step::EndSuspension),
        2 => arb_peer_seed().prop_map(Step::Timeout),
        1 => arb_peer_seed().prop_map(Step::Invalidate),
        1 => arb_peer_seed().prop_map(Step::PeerEnded),
    ]
}

/// Strategy for step sequences
pub fn arb_steps(max_len: usize) -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(arb_step(), 0..max_len)
}
