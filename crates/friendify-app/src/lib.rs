//! # Friendify App
//!
//! Headless application core. [`SessionOrchestrator`] composes the transport
//! and ranging coordinators with the [`PeerTable`] into the full peer
//! lifecycle, and publishes everything a front end shows through
//! [`AppView`].
//!
//! ```ignore
//! let (inbox, rx) = Inbox::new();
//! let engine = space.engine(device, inbox.ranging_sink());
//! let orchestrator = SessionOrchestrator::new(&config, factory, Box::new(engine), inbox)?;
//! let handle = orchestrator.spawn(rx);
//! handle.connect();
//! ```

pub mod errors;
pub mod orchestrator;
pub mod session;
pub mod view;

// ============================================================================
// Re-exports
// ============================================================================

pub use errors::{AppError, AppResult, ErrorCategory};
pub use orchestrator::{
    Command, Inbound, Inbox, OrchestratorHandle, SessionOrchestrator, TransportFactory,
};
pub use session::{PeerSession, PeerTable};
pub use view::{AppSnapshot, AppView, PeerSummary};
