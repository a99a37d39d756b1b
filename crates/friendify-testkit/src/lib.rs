//! Friendify Testing Infrastructure
//!
//! Recording mocks for both collaborator boundaries, deterministic fixtures,
//! proptest strategies, and a [`Harness`] that drives a
//! [`SessionOrchestrator`](friendify_app::SessionOrchestrator) by hand.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use friendify_testkit::*;
//!
//! let mut harness = Harness::new();
//! harness.connect();
//! harness.peer_connected(1);
//! harness.receive_credential(1);
//! harness.sample(1, fixtures::close_left());
//! assert_eq!(harness.view().peers().len(), 1);
//! ```

pub mod fixtures;
pub mod harness;
pub mod mocks;
pub mod strategies;

// Re-export commonly used items
pub use harness::Harness;
pub use mocks::{
    MockRangingEngine, MockTransport, RangingCall, RangingLog, TransportCall, TransportLog,
};
pub use strategies::Step;
