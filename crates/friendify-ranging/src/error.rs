//! Ranging errors

use crate::engine::HandleId;
use thiserror::Error;

/// Errors raised by a [`RangingEngine`](crate::RangingEngine)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangingError {
    /// Device has no ranging hardware
    #[error("ranging is not supported on this device")]
    Unsupported,

    /// User has not granted ranging permission
    #[error("ranging access has not been granted")]
    AccessRequired,

    /// Handle was never created or has been invalidated
    #[error("unknown ranging handle {0}")]
    UnknownHandle(HandleId),

    /// Engine failure
    #[error("ranging engine error: {0}")]
    Engine(String),
}

impl RangingError {
    /// Whether this error means ranging can never work without user action
    pub fn is_capability(&self) -> bool {
        matches!(self, Self::Unsupported | Self::AccessRequired)
    }
}

/// Result type for ranging operations
pub type RangingResult<T> = Result<T, RangingError>;
