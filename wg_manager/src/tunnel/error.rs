//! Error types for the tunnel module.

use thiserror::Error;

use crate::tunnel::config::ConfigParseError;
use crate::tunnel::types::{TunnelId, TunnelStatus};

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;

/// Error types that can occur in tunnel operations.
///
/// Everything except `EngineFailure` is a synchronous validation error and
/// leaves the tunnel record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunnelError {
    /// A tunnel with this name is already registered
    #[error("Tunnel already exists: {0}")]
    DuplicateName(String),

    /// Another transition is still in flight for this tunnel
    #[error("Operation in progress on tunnel {name} (status: {status})")]
    OperationInProgress { name: String, status: TunnelStatus },

    /// The request does not apply to the tunnel's current status
    #[error("Cannot {action} tunnel {name} while {status}")]
    InvalidTransition {
        name: String,
        status: TunnelStatus,
        action: &'static str,
    },

    /// The tunnel engine reported or caused a failure
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// No tunnel is registered under this handle
    #[error("Tunnel not found: {0}")]
    NotFound(TunnelId),

    /// The configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<ConfigParseError> for TunnelError {
    fn from(err: ConfigParseError) -> Self {
        TunnelError::InvalidConfiguration(err.to_string())
    }
}
