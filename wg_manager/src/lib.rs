//! Tunnel lifecycle coordination for WireGuard front-ends.
//!
//! This crate owns the in-memory set of tunnels, validates activation and
//! deactivation requests against the tunnel status state machine, hands the
//! actual work to an external tunnel engine and fans status changes out to
//! any number of subscribers.

pub mod config;
pub mod logging;
pub mod tunnel;

// Re-export commonly used items for convenience
pub use config::{Settings, SettingsManager};
pub use tunnel::{
    TunnelConfiguration, TunnelError, TunnelEvent, TunnelId, TunnelResult, TunnelStatus,
    TunnelsManager,
};
