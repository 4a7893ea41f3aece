//! Key/value rows describing one tunnel, for detail views and `wgctl show`.
//!
//! Empty fields are skipped. The first row of each section is a title row
//! whose key is the section name.

use serde::Serialize;

use crate::tunnel::config::TunnelConfiguration;
use crate::tunnel::on_demand::ActivateOnDemandSetting;
use crate::tunnel::types::{RuntimeStats, TunnelSnapshot, TunnelStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailSection {
    Interface,
    Status,
    Peer,
    OnDemand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub section: DetailSection,
    pub key: String,
    pub value: String,
    pub is_title: bool,
}

/// State of the on/off control for a tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusToggle {
    pub label: String,
    pub on: bool,
    pub enabled: bool,
}

impl StatusToggle {
    pub fn for_status(status: TunnelStatus) -> Self {
        StatusToggle {
            label: format!("Status: {status}"),
            on: status.is_toggle_on(),
            enabled: status.is_toggle_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelDetail {
    pub toggle: StatusToggle,
    pub rows: Vec<DetailRow>,
}

impl TunnelDetail {
    pub fn from_snapshot(snapshot: &TunnelSnapshot) -> Self {
        Self::build(
            &snapshot.configuration,
            snapshot.status,
            snapshot.activate_on_demand.as_ref(),
            snapshot.runtime_stats.as_ref(),
        )
    }

    pub fn build(
        configuration: &TunnelConfiguration,
        status: TunnelStatus,
        on_demand: Option<&ActivateOnDemandSetting>,
        stats: Option<&RuntimeStats>,
    ) -> Self {
        let mut rows = RowBuilder::default();
        let iface = &configuration.interface;

        rows.title(DetailSection::Interface, "Interface", &configuration.name);
        rows.field(DetailSection::Interface, "Addresses", join(&iface.addresses));
        rows.field(
            DetailSection::Interface,
            "Listen port",
            iface.listen_port.map(|p| p.to_string()).unwrap_or_default(),
        );
        rows.field(
            DetailSection::Interface,
            "MTU",
            iface.mtu.map(|m| m.to_string()).unwrap_or_default(),
        );
        let dns: Vec<String> = iface
            .dns
            .iter()
            .map(ToString::to_string)
            .chain(iface.dns_search.iter().cloned())
            .collect();
        rows.field(DetailSection::Interface, "DNS servers", dns.join(", "));

        if let Some(stats) = stats {
            rows.title(DetailSection::Status, "Status", status.as_str());
            rows.field(DetailSection::Status, "Data received", pretty_bytes(stats.rx_bytes));
            rows.field(DetailSection::Status, "Data sent", pretty_bytes(stats.tx_bytes));
            rows.field(
                DetailSection::Status,
                "Latest handshake",
                stats
                    .last_handshake
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_default(),
            );
        }

        for peer in &configuration.peers {
            rows.title(DetailSection::Peer, "Peer", &peer.public_key.to_base64());
            rows.field(
                DetailSection::Peer,
                "Preshared key",
                if peer.preshared_key.is_some() { "enabled" } else { "" }.to_string(),
            );
            rows.field(
                DetailSection::Peer,
                "Endpoint",
                peer.endpoint.as_ref().map(ToString::to_string).unwrap_or_default(),
            );
            rows.field(DetailSection::Peer, "Allowed IPs", join(&peer.allowed_ips));
            rows.field(
                DetailSection::Peer,
                "Persistent keepalive",
                peer.persistent_keepalive
                    .map(|s| format!("every {s} seconds"))
                    .unwrap_or_default(),
            );
        }

        let on_demand_text = on_demand
            .map(ActivateOnDemandSetting::detail_text)
            .unwrap_or_else(|| "Off".to_string());
        rows.title(DetailSection::OnDemand, "On-Demand", &on_demand_text);

        TunnelDetail {
            toggle: StatusToggle::for_status(status),
            rows: rows.0,
        }
    }
}

#[derive(Default)]
struct RowBuilder(Vec<DetailRow>);

impl RowBuilder {
    fn title(&mut self, section: DetailSection, key: &str, value: &str) {
        self.0.push(DetailRow {
            section,
            key: key.to_string(),
            value: value.to_string(),
            is_title: true,
        });
    }

    fn field(&mut self, section: DetailSection, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        self.0.push(DetailRow {
            section,
            key: key.to_string(),
            value,
            is_title: false,
        });
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn pretty_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::config::{InterfaceConfiguration, PeerConfiguration, WireGuardKey};
    use crate::tunnel::on_demand::OnDemandRule;

    fn config() -> TunnelConfiguration {
        let mut iface = InterfaceConfiguration::new(WireGuardKey::from_bytes([3; 32]));
        iface.addresses.push("10.0.0.2/32".parse().unwrap());
        let mut peer = PeerConfiguration::new(WireGuardKey::from_bytes([4; 32]));
        peer.allowed_ips.push("0.0.0.0/0".parse().unwrap());
        peer.persistent_keepalive = Some(25);
        TunnelConfiguration::new("office", iface).with_peer(peer)
    }

    #[test]
    fn empty_fields_are_skipped() {
        let detail = TunnelDetail::build(&config(), TunnelStatus::Inactive, None, None);
        let keys: Vec<&str> = detail.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "Interface",
                "Addresses",
                "Peer",
                "Allowed IPs",
                "Persistent keepalive",
                "On-Demand"
            ]
        );
        assert_eq!(detail.rows[0].value, "office");
        assert_eq!(detail.rows.last().unwrap().value, "Off");
    }

    #[test]
    fn stats_rows_appear_when_present() {
        let stats = RuntimeStats {
            rx_bytes: 1536,
            tx_bytes: 100,
            last_handshake: None,
        };
        let on_demand = ActivateOnDemandSetting::on(OnDemandRule::WiFiOnly);
        let detail =
            TunnelDetail::build(&config(), TunnelStatus::Active, Some(&on_demand), Some(&stats));

        let received = detail.rows.iter().find(|r| r.key == "Data received").unwrap();
        assert_eq!(received.value, "1.50 KiB");
        let sent = detail.rows.iter().find(|r| r.key == "Data sent").unwrap();
        assert_eq!(sent.value, "100 B");
        assert_eq!(detail.rows.last().unwrap().value, "Wi-Fi only");
    }

    #[test]
    fn toggle_reflects_status() {
        let toggle = StatusToggle::for_status(TunnelStatus::Activating);
        assert_eq!(toggle.label, "Status: activating");
        assert!(toggle.on);
        assert!(!toggle.enabled);
    }
}
