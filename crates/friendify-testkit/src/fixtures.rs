//! Deterministic peers, credentials and samples

use friendify_core::{DiscoveryToken, FriendifyConfig, PeerId, RangingSample, Vector3};
use friendify_ranging::HandleId;

/// Seed of the local device in [`Harness`](crate::Harness)
pub const LOCAL_SEED: u8 = 0;

/// Peer with a stable identifier derived from `seed`
pub fn peer(seed: u8) -> PeerId {
    PeerId::from_seed(seed)
}

/// Display name fixtures use for `peer(seed)`
pub fn peer_name(seed: u8) -> String {
    format!("peer {seed}")
}

/// Credential the mock engine issues for `handle`
pub fn local_credential(handle: HandleId) -> DiscoveryToken {
    DiscoveryToken::from_bytes(format!("local-{}", handle.0).into_bytes())
}

/// Credential a remote `peer(seed)` sends us
pub fn peer_credential(seed: u8) -> DiscoveryToken {
    DiscoveryToken::from_bytes(format!("remote-{seed}").into_bytes())
}

/// Configuration with a fixed local name and room for `max_peers`
pub fn config(max_peers: usize) -> FriendifyConfig {
    FriendifyConfig::default()
        .with_display_name("local")
        .with_max_peers(max_peers)
}

/// Unit vector straight ahead
pub fn ahead() -> Vector3 {
    Vector3::new(0.0, 0.0, -1.0)
}

/// Very close and to the left
pub fn close_left() -> RangingSample {
    RangingSample::new(0.1, Vector3::new(-0.2, 0.0, 0.0))
}

/// Far and straight ahead
pub fn far_ahead(distance: f32) -> RangingSample {
    RangingSample::new(distance, ahead())
}

/// Distance only, peer outside the field of view
pub fn out_of_view(distance: f32) -> RangingSample {
    RangingSample::distance_only(distance)
}
