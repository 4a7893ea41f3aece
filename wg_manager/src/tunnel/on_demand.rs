//! Activate-on-demand policy.
//!
//! A policy says on which kinds of network a tunnel should come up without
//! an explicit request. The manager evaluates it against the current
//! [`NetworkConditions`] whenever the host reports a network change.

use serde::{Deserialize, Serialize};

/// Interface types a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnDemandRule {
    /// Wi-Fi and every other interface type
    #[default]
    AnyInterface,
    /// Wi-Fi only
    WiFiOnly,
    /// Every interface type except Wi-Fi (ethernet, cellular)
    NonWiFiOnly,
}

/// Which Wi-Fi networks a Wi-Fi rule covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "ssids")]
pub enum SsidPolicy {
    #[default]
    Any,
    /// Only these networks trigger activation
    OnlyThese(Vec<String>),
    /// Every network except these (the trusted ones)
    ExceptThese(Vec<String>),
}

impl SsidPolicy {
    fn covers(&self, ssid: Option<&str>) -> bool {
        match self {
            SsidPolicy::Any => true,
            SsidPolicy::OnlyThese(list) => ssid.is_some_and(|s| list.iter().any(|l| l == s)),
            SsidPolicy::ExceptThese(list) => !ssid.is_some_and(|s| list.iter().any(|l| l == s)),
        }
    }
}

/// Automatic activation policy attached to a tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActivateOnDemandSetting {
    pub enabled: bool,
    #[serde(default)]
    pub rule: OnDemandRule,
    #[serde(default)]
    pub ssids: SsidPolicy,
}

impl ActivateOnDemandSetting {
    pub fn off() -> Self {
        ActivateOnDemandSetting::default()
    }

    pub fn on(rule: OnDemandRule) -> Self {
        ActivateOnDemandSetting {
            enabled: true,
            rule,
            ssids: SsidPolicy::Any,
        }
    }

    pub fn with_ssids(mut self, ssids: SsidPolicy) -> Self {
        self.ssids = ssids;
        self
    }

    /// Whether the tunnel should be brought up on the given network.
    pub fn should_activate(&self, network: &NetworkConditions) -> bool {
        if !self.enabled {
            return false;
        }
        match network {
            NetworkConditions::Offline => false,
            NetworkConditions::WiFi { ssid } => {
                self.rule != OnDemandRule::NonWiFiOnly && self.ssids.covers(ssid.as_deref())
            }
            NetworkConditions::Ethernet | NetworkConditions::Cellular => {
                self.rule != OnDemandRule::WiFiOnly
            }
        }
    }

    /// One-line summary suitable for a detail view.
    pub fn detail_text(&self) -> String {
        if !self.enabled {
            return "Off".to_string();
        }
        let base = match self.rule {
            OnDemandRule::AnyInterface => "Wi-Fi or other interfaces",
            OnDemandRule::WiFiOnly => "Wi-Fi only",
            OnDemandRule::NonWiFiOnly => "Interfaces other than Wi-Fi",
        };
        match (&self.rule, &self.ssids) {
            (OnDemandRule::NonWiFiOnly, _) | (_, SsidPolicy::Any) => base.to_string(),
            (_, SsidPolicy::OnlyThese(list)) => format!("{base} (only {})", list.join(", ")),
            (_, SsidPolicy::ExceptThese(list)) => format!("{base} (except {})", list.join(", ")),
        }
    }
}

/// The host's current primary network, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NetworkConditions {
    Offline,
    WiFi { ssid: Option<String> },
    Ethernet,
    Cellular,
}
