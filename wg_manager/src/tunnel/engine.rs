//! Boundary to the external tunnel engine.
//!
//! The engine performs key exchange and packet routing, usually out of
//! process or in a privileged helper. The manager only hands it directives
//! and listens to the [`EngineEvent`]s it sends back.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::tunnel::config::TunnelConfiguration;
use crate::tunnel::types::{RuntimeStats, TunnelId};

/// Errors returned by the engine when it refuses a directive outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected the directive
    #[error("{0}")]
    Rejected(String),
}

/// Asynchronous report from the engine about one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The tunnel is up
    Activated,
    /// The tunnel is down
    Deactivated,
    /// The tunnel is renegotiating, e.g. after a network change
    Reasserting,
    /// Renegotiation finished
    Reasserted,
    /// Activation is on hold until a prerequisite becomes available
    Waiting,
    /// The prerequisite is available, activation resumes
    PrerequisiteMet,
    /// The in-flight operation failed
    Failed(String),
    /// Fresh counters for an active tunnel
    Stats(RuntimeStats),
}

/// Sending half the engine uses to report back to the manager.
pub type EngineEventSender = mpsc::UnboundedSender<(TunnelId, EngineEvent)>;

/// Directives the manager sends to the engine.
///
/// Every method is a hand-off: it returns once the engine has accepted the
/// directive, not once the work is done. Completion arrives as an
/// [`EngineEvent`].
#[async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Begin bringing the tunnel up with the given configuration.
    async fn start_tunnel(
        &self,
        id: TunnelId,
        configuration: &TunnelConfiguration,
    ) -> Result<(), EngineError>;

    /// Begin tearing the tunnel down.
    async fn stop_tunnel(&self, id: TunnelId) -> Result<(), EngineError>;

    /// The configuration the engine is actually running, if the tunnel is up.
    async fn runtime_configuration(&self, id: TunnelId) -> Option<TunnelConfiguration>;
}
