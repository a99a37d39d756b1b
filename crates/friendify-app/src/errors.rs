//! Categorized application errors
//!
//! Every failure the orchestrator can hit is folded into [`AppError`], and each
//! error maps to an [`ErrorCategory`] that front ends use to decide how loudly
//! to surface it and what to tell the user.

use friendify_core::{ConfigError, LimiterPolicy, PeerId, SessionState};
use friendify_ranging::RangingError;
use friendify_transport::{TransportError, WireError};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Categories
// ============================================================================

/// High-level error categories for front-end handling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Peer sent something we cannot decode
    Protocol,
    /// Transport failed to deliver or is not running
    Network,
    /// Ranging session failed; recovery is automatic
    Ranging,
    /// Device cannot range, or permission is missing
    Capability,
    /// Configuration is invalid
    Config,
    /// User input was rejected
    Input,
}

impl ErrorCategory {
    /// Whether retrying may succeed without user action
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Ranging)
    }

    /// Whether the user can fix the problem themselves
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Input | Self::Config | Self::Capability)
    }

    /// Short label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Protocol => "Protocol",
            Self::Network => "Network",
            Self::Ranging => "Ranging",
            Self::Capability => "Permission",
            Self::Config => "Config",
            Self::Input => "Input",
        }
    }

    /// Hint shown next to the error
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Protocol => "The peer sent an unreadable message; it was ignored",
            Self::Network => "Move closer to the peer and try again",
            Self::Ranging => "Ranging will recover on its own",
            Self::Capability => "Allow Nearby Interactions in Settings, or use a supported device",
            Self::Config => "Review your configuration file",
            Self::Input => "Check your input and try again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Application Error
// ============================================================================

/// Any error raised by the application core
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed payload from a peer
    #[error("protocol violation from {peer}: {source}")]
    Protocol {
        /// Sender
        peer: PeerId,
        /// Decode failure
        #[source]
        source: WireError,
    },

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Ranging failure
    #[error(transparent)]
    Ranging(#[from] RangingError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Coalesced updates were configured but there is no runtime to run them on
    #[error("update policy {policy} needs a Tokio runtime; build the orchestrator inside one")]
    RuntimeRequired {
        /// Configured policy
        policy: LimiterPolicy,
    },

    /// Transport has not been started yet
    #[error("not connected: request a connection first")]
    NotStarted,

    /// Rejected user input
    #[error("invalid input: {0}")]
    Input(String),
}

impl AppError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::Transport(_) | Self::NotStarted => ErrorCategory::Network,
            Self::Ranging(error) if error.is_capability() => ErrorCategory::Capability,
            Self::Ranging(_) => ErrorCategory::Ranging,
            Self::Config(_) | Self::RuntimeRequired { .. } => ErrorCategory::Config,
            Self::Input(_) => ErrorCategory::Input,
        }
    }

    /// Whether retrying may succeed
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }

    /// Hint for the user
    pub fn resolution_hint(&self) -> &'static str {
        self.category().resolution_hint()
    }

    /// Terminal session state this error forces, if any
    pub fn session_state(&self) -> Option<SessionState> {
        match self {
            Self::Ranging(RangingError::AccessRequired) => Some(SessionState::AccessRequired),
            Self::Ranging(RangingError::Unsupported) => Some(SessionState::Unsupported),
            _ => None,
        }
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
