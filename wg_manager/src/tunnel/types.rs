//! Type definitions for the tunnel module.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tunnel::config::TunnelConfiguration;
use crate::tunnel::on_demand::ActivateOnDemandSetting;

/// Stable handle for a tunnel owned by a [`TunnelsManager`](crate::TunnelsManager).
///
/// The handle survives renames; the name is only the user-facing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelId(pub Uuid);

impl TunnelId {
    /// Generate a fresh random handle.
    pub fn new() -> Self {
        TunnelId(Uuid::new_v4())
    }
}

impl Default for TunnelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a tunnel.
///
/// Variants are declared in lifecycle order, so the derived ordering follows
/// the lifecycle stage rather than any numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    /// Tunnel is down; the initial and resting state
    Inactive,
    /// Activation handed to the engine, waiting for its verdict
    Activating,
    /// Tunnel is up
    Active,
    /// Tunnel is up but renegotiating (e.g. after a network change)
    Reasserting,
    /// Deactivation handed to the engine, waiting for completion
    Deactivating,
    /// Configuration changed while up; stopping before reactivating
    Restarting,
    /// Activation requested but a prerequisite is unavailable
    Waiting,
}

impl TunnelStatus {
    /// Whether a status toggle should be shown as switched on.
    pub fn is_toggle_on(self) -> bool {
        !matches!(self, TunnelStatus::Inactive | TunnelStatus::Deactivating)
    }

    /// Whether a status toggle should accept user input.
    ///
    /// Only the two resting states are operable; everything else is shown
    /// but disabled.
    pub fn is_toggle_enabled(self) -> bool {
        matches!(self, TunnelStatus::Active | TunnelStatus::Inactive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TunnelStatus::Inactive => "inactive",
            TunnelStatus::Activating => "activating",
            TunnelStatus::Active => "active",
            TunnelStatus::Reasserting => "reasserting",
            TunnelStatus::Deactivating => "deactivating",
            TunnelStatus::Restarting => "restarting",
            TunnelStatus::Waiting => "waiting",
        }
    }
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Live counters reported by the engine while a tunnel is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    /// Total bytes sent through the tunnel
    pub tx_bytes: u64,
    /// Total bytes received through the tunnel
    pub rx_bytes: u64,
    /// Most recent successful handshake with any peer
    pub last_handshake: Option<DateTime<Utc>>,
}

/// Point-in-time copy of a tunnel record, handed out to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunnelSnapshot {
    pub id: TunnelId,
    pub name: String,
    pub configuration: TunnelConfiguration,
    pub status: TunnelStatus,
    pub activate_on_demand: Option<ActivateOnDemandSetting>,
    pub runtime_stats: Option<RuntimeStats>,
}
