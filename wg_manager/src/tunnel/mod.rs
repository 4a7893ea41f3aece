//! Tunnel records, the status state machine and the tunnels manager.
//!
//! The manager never touches sockets or kernel interfaces itself. It drives
//! an external [`TunnelEngine`] and mirrors what that engine reports back
//! into the records it owns, publishing a [`TunnelEvent`] for every change.

mod config;
pub mod detail;
mod engine;
mod error;
mod events;
mod manager;
pub mod on_demand;
pub mod sim;
pub mod state;
pub mod types;

pub use config::{
    ConfigParseError, Endpoint, InterfaceConfiguration, IpAddressRange, PeerConfiguration,
    TunnelConfiguration, WireGuardKey,
};
pub use engine::{EngineError, EngineEvent, EngineEventSender, TunnelEngine};
pub use error::{TunnelError, TunnelResult};
pub use events::{EventHub, Subscription, SubscriptionId, TunnelEvent};
pub use manager::{ManagerOptions, TunnelsManager};
pub use detail::{DetailRow, DetailSection, StatusToggle, TunnelDetail};
pub use on_demand::{ActivateOnDemandSetting, NetworkConditions, OnDemandRule, SsidPolicy};
pub use state::{TransitionError, Trigger};
pub use types::{RuntimeStats, TunnelId, TunnelSnapshot, TunnelStatus};
