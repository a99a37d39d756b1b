//! # Friendify Ranging
//!
//! The boundary to the distance/direction engine:
//! - [`RangingEngine`] and [`RangingEvent`], the collaborator interface
//! - [`RangingCoordinator`], one handle per peer plus the recovery policy
//! - [`SimulatedSpace`] and [`SimulatedRangingEngine`], a geometric engine
//!   for tests and the simulator

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod simulated;

// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{RangingCoordinator, RangingSignal};
pub use engine::{
    HandleId, RangingCapability, RangingEngine, RangingEvent, RangingHandle, RemovalReason,
    RunConfiguration,
};
pub use error::{RangingError, RangingResult};
pub use simulated::{
    Fault, Pose, SimulatedRangingEngine, SimulatedSpace, DEFAULT_FIELD_OF_VIEW,
    DEFAULT_MAX_RANGE_M,
};
