//! # Friendify Core
//!
//! Pure domain types shared by every Friendify crate:
//! - [`PeerId`] and [`DiscoveryToken`], the keys of the peer handshake
//! - [`RangingClassifier`], turning raw samples into display states
//! - [`SessionState`], the aggregate phase shown to the user
//! - [`Limiter`], the throttle/debounce primitive for bursty updates
//! - [`EventSink`], the funnel through which collaborators report events
//! - [`FriendifyConfig`], the TOML configuration

pub mod classifier;
pub mod config;
pub mod credential;
pub mod events;
pub mod identifiers;
pub mod limiter;
pub mod session_state;

// ============================================================================
// Re-exports
// ============================================================================

pub use classifier::{
    azimuth, classify, elevation, Classification, Direction, DistanceDirectionState, Orientation,
    RangingClassifier, RangingSample, Vector3, DEFAULT_NEAR_THRESHOLD_M,
};
pub use config::{
    ConfigError, DeviceConfig, DisplayConfig, FriendifyConfig, RangingConfig, TransportConfig,
};
pub use credential::DiscoveryToken;
pub use events::EventSink;
pub use identifiers::PeerId;
pub use limiter::{Limiter, LimiterPolicy};
pub use session_state::SessionState;
