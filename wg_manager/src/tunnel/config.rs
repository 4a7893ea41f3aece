//! Tunnel configuration: one interface block plus an ordered list of peers.
//!
//! Configurations can be imported from and exported to the wg-quick text
//! format (`[Interface]` / `[Peer]` sections of `Key = Value` lines).

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors produced while parsing or validating a tunnel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigParseError {
    /// A section header other than `[Interface]` or `[Peer]`
    #[error("line {line}: unknown section [{section}]")]
    UnknownSection { line: usize, section: String },

    /// A `Key = Value` line before any section header
    #[error("line {line}: {key} appears outside of a section")]
    KeyOutsideSection { line: usize, key: String },

    /// A line that is neither a section header nor `Key = Value`
    #[error("line {line}: expected `Key = Value`")]
    MalformedLine { line: usize },

    /// A key not valid in its section
    #[error("line {line}: unknown key {key}")]
    UnknownKey { line: usize, key: String },

    /// The same single-valued key set twice in one section
    #[error("line {line}: duplicate key {key}")]
    DuplicateKey { line: usize, key: String },

    /// A value that could not be parsed
    #[error("line {line}: invalid value for {key}: {message}")]
    InvalidValue {
        line: usize,
        key: String,
        message: String,
    },

    /// More than one `[Interface]` section
    #[error("line {line}: only one [Interface] section is allowed")]
    MultipleInterfaces { line: usize },

    /// No `[Interface]` section at all
    #[error("missing [Interface] section")]
    MissingInterface,

    /// A section without one of its required keys
    #[error("[{section}] is missing required key {key}")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    /// A single field failed to parse outside of any file context
    #[error("{0}")]
    InvalidField(String),
}

/// A Curve25519 key (private, public or pre-shared), 32 raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireGuardKey([u8; 32]);

impl WireGuardKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        WireGuardKey(bytes)
    }

    /// Decode a key from its standard base64 form (44 characters).
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigParseError> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| ConfigParseError::InvalidField(format!("key is not base64: {e}")))?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            ConfigParseError::InvalidField(format!("key must be 32 bytes, got {}", v.len()))
        })?;
        Ok(WireGuardKey(bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for WireGuardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WireGuardKey(..)")
    }
}

impl Serialize for WireGuardKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

/// An address with a prefix length, e.g. `10.0.0.2/32` or `fd00::/64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpAddressRange {
    pub address: IpAddr,
    pub prefix: u8,
}

impl IpAddressRange {
    fn max_prefix(address: &IpAddr) -> u8 {
        match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }
}

impl FromStr for IpAddressRange {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr_part, prefix_part) = match s.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s, None),
        };
        let address: IpAddr = addr_part
            .parse()
            .map_err(|_| ConfigParseError::InvalidField(format!("invalid address {addr_part}")))?;
        let max = Self::max_prefix(&address);
        let prefix = match prefix_part {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| ConfigParseError::InvalidField(format!("invalid prefix {p}")))?,
            None => max,
        };
        Ok(IpAddressRange { address, prefix })
    }
}

impl fmt::Display for IpAddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

impl Serialize for IpAddressRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A peer endpoint: host name or IP literal plus UDP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConfigParseError::InvalidField(format!("invalid endpoint {s}"));

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest.split_once("]:").ok_or_else(invalid)?;
            host.parse::<std::net::Ipv6Addr>().map_err(|_| invalid())?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
            if host.contains(':') {
                // Bare IPv6 literals must be bracketed
                return Err(invalid());
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The local side of a tunnel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceConfiguration {
    /// Never serialized
    #[serde(skip_serializing)]
    pub private_key: WireGuardKey,

    /// Addresses assigned to the tunnel interface
    pub addresses: Vec<IpAddressRange>,

    /// UDP listen port (random when unset)
    pub listen_port: Option<u16>,

    /// Interface MTU (automatic when unset)
    pub mtu: Option<u16>,

    /// DNS servers
    pub dns: Vec<IpAddr>,

    /// DNS search domains (non-address `DNS` entries)
    pub dns_search: Vec<String>,
}

impl InterfaceConfiguration {
    pub fn new(private_key: WireGuardKey) -> Self {
        InterfaceConfiguration {
            private_key,
            addresses: Vec::new(),
            listen_port: None,
            mtu: None,
            dns: Vec::new(),
            dns_search: Vec::new(),
        }
    }
}

/// One remote peer of a tunnel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerConfiguration {
    pub public_key: WireGuardKey,

    /// Never serialized
    #[serde(skip_serializing)]
    pub preshared_key: Option<WireGuardKey>,

    pub endpoint: Option<Endpoint>,

    pub allowed_ips: Vec<IpAddressRange>,

    /// Keepalive interval in seconds
    pub persistent_keepalive: Option<u16>,
}

impl PeerConfiguration {
    pub fn new(public_key: WireGuardKey) -> Self {
        PeerConfiguration {
            public_key,
            preshared_key: None,
            endpoint: None,
            allowed_ips: Vec::new(),
            persistent_keepalive: None,
        }
    }
}

/// Configuration for a tunnel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunnelConfiguration {
    /// User-facing name, unique within a manager
    pub name: String,

    /// The `[Interface]` block
    pub interface: InterfaceConfiguration,

    /// The `[Peer]` blocks, in file order
    pub peers: Vec<PeerConfiguration>,
}

impl TunnelConfiguration {
    /// Create a configuration with no peers.
    pub fn new(name: impl Into<String>, interface: InterfaceConfiguration) -> Self {
        TunnelConfiguration {
            name: name.into(),
            interface,
            peers: Vec::new(),
        }
    }

    /// Append a peer.
    pub fn with_peer(mut self, peer: PeerConfiguration) -> Self {
        self.peers.push(peer);
        self
    }

    /// Rename the configuration.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigParseError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigParseError::InvalidField(
                "tunnel name cannot be empty".to_string(),
            ));
        }
        if name.len() != self.name.len() || self.name.chars().any(|c| c.is_control()) {
            return Err(ConfigParseError::InvalidField(format!(
                "tunnel name {:?} contains surrounding whitespace or control characters",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.public_key) {
                return Err(ConfigParseError::InvalidField(format!(
                    "two peers share the public key {}",
                    peer.public_key.to_base64()
                )));
            }
        }

        Ok(())
    }

    /// Parse a wg-quick style configuration.
    pub fn from_wg_quick(name: impl Into<String>, text: &str) -> Result<Self, ConfigParseError> {
        let mut parser = WgQuickParser::default();
        for (index, raw) in text.lines().enumerate() {
            parser.feed(index + 1, raw)?;
        }
        let config = parser.finish(name.into())?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration in wg-quick format, private keys included.
    pub fn to_wg_quick(&self) -> String {
        let mut out = String::from("[Interface]\n");
        let iface = &self.interface;
        out.push_str(&format!("PrivateKey = {}\n", iface.private_key.to_base64()));
        if !iface.addresses.is_empty() {
            out.push_str(&format!("Address = {}\n", join(&iface.addresses)));
        }
        if let Some(port) = iface.listen_port {
            out.push_str(&format!("ListenPort = {port}\n"));
        }
        if let Some(mtu) = iface.mtu {
            out.push_str(&format!("MTU = {mtu}\n"));
        }
        if !iface.dns.is_empty() || !iface.dns_search.is_empty() {
            let entries: Vec<String> = iface
                .dns
                .iter()
                .map(ToString::to_string)
                .chain(iface.dns_search.iter().cloned())
                .collect();
            out.push_str(&format!("DNS = {}\n", entries.join(", ")));
        }

        for peer in &self.peers {
            out.push_str("\n[Peer]\n");
            out.push_str(&format!("PublicKey = {}\n", peer.public_key.to_base64()));
            if let Some(psk) = &peer.preshared_key {
                out.push_str(&format!("PresharedKey = {}\n", psk.to_base64()));
            }
            if !peer.allowed_ips.is_empty() {
                out.push_str(&format!("AllowedIPs = {}\n", join(&peer.allowed_ips)));
            }
            if let Some(endpoint) = &peer.endpoint {
                out.push_str(&format!("Endpoint = {endpoint}\n"));
            }
            if let Some(keepalive) = peer.persistent_keepalive {
                out.push_str(&format!("PersistentKeepalive = {keepalive}\n"));
            }
        }
        out
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Default)]
struct PartialInterface {
    private_key: Option<WireGuardKey>,
    addresses: Vec<IpAddressRange>,
    listen_port: Option<u16>,
    mtu: Option<u16>,
    dns: Vec<IpAddr>,
    dns_search: Vec<String>,
}

#[derive(Default)]
struct PartialPeer {
    public_key: Option<WireGuardKey>,
    preshared_key: Option<WireGuardKey>,
    endpoint: Option<Endpoint>,
    allowed_ips: Vec<IpAddressRange>,
    persistent_keepalive: Option<u16>,
}

enum Section {
    Interface,
    Peer,
}

#[derive(Default)]
struct WgQuickParser {
    section: Option<Section>,
    interface: Option<PartialInterface>,
    peers: Vec<PartialPeer>,
}

impl WgQuickParser {
    fn feed(&mut self, line: usize, raw: &str) -> Result<(), ConfigParseError> {
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            return Ok(());
        }

        if let Some(header) = content.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            match header.trim().to_ascii_lowercase().as_str() {
                "interface" => {
                    if self.interface.is_some() {
                        return Err(ConfigParseError::MultipleInterfaces { line });
                    }
                    self.interface = Some(PartialInterface::default());
                    self.section = Some(Section::Interface);
                }
                "peer" => {
                    self.peers.push(PartialPeer::default());
                    self.section = Some(Section::Peer);
                }
                other => {
                    return Err(ConfigParseError::UnknownSection {
                        line,
                        section: other.to_string(),
                    });
                }
            }
            return Ok(());
        }

        let (key, value) = content
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or(ConfigParseError::MalformedLine { line })?;
        if key.is_empty() {
            return Err(ConfigParseError::MalformedLine { line });
        }

        let invalid = |e: ConfigParseError| ConfigParseError::InvalidValue {
            line,
            key: key.to_string(),
            message: match e {
                ConfigParseError::InvalidField(m) => m,
                other => other.to_string(),
            },
        };
        let duplicate = || ConfigParseError::DuplicateKey {
            line,
            key: key.to_string(),
        };

        match (&self.section, key.to_ascii_lowercase().as_str()) {
            (None, _) => Err(ConfigParseError::KeyOutsideSection {
                line,
                key: key.to_string(),
            }),
            (Some(Section::Interface), lower) => {
                let iface = self
                    .interface
                    .as_mut()
                    .ok_or(ConfigParseError::MissingInterface)?;
                match lower {
                    "privatekey" => {
                        if iface.private_key.is_some() {
                            return Err(duplicate());
                        }
                        iface.private_key = Some(WireGuardKey::from_base64(value).map_err(invalid)?);
                    }
                    "address" => {
                        iface.addresses.extend(parse_list::<IpAddressRange>(value).map_err(invalid)?);
                    }
                    "listenport" => {
                        if iface.listen_port.is_some() {
                            return Err(duplicate());
                        }
                        iface.listen_port = Some(parse_number(value).map_err(invalid)?);
                    }
                    "mtu" => {
                        if iface.mtu.is_some() {
                            return Err(duplicate());
                        }
                        iface.mtu = Some(parse_number(value).map_err(invalid)?);
                    }
                    "dns" => {
                        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                            match entry.parse::<IpAddr>() {
                                Ok(addr) => iface.dns.push(addr),
                                Err(_) => iface.dns_search.push(entry.to_string()),
                            }
                        }
                    }
                    _ => {
                        return Err(ConfigParseError::UnknownKey {
                            line,
                            key: key.to_string(),
                        });
                    }
                }
                Ok(())
            }
            (Some(Section::Peer), lower) => {
                let peer = self
                    .peers
                    .last_mut()
                    .ok_or(ConfigParseError::MalformedLine { line })?;
                match lower {
                    "publickey" => {
                        if peer.public_key.is_some() {
                            return Err(duplicate());
                        }
                        peer.public_key = Some(WireGuardKey::from_base64(value).map_err(invalid)?);
                    }
                    "presharedkey" => {
                        if peer.preshared_key.is_some() {
                            return Err(duplicate());
                        }
                        peer.preshared_key =
                            Some(WireGuardKey::from_base64(value).map_err(invalid)?);
                    }
                    "endpoint" => {
                        if peer.endpoint.is_some() {
                            return Err(duplicate());
                        }
                        peer.endpoint = Some(value.parse::<Endpoint>().map_err(invalid)?);
                    }
                    "allowedips" => {
                        peer.allowed_ips
                            .extend(parse_list::<IpAddressRange>(value).map_err(invalid)?);
                    }
                    "persistentkeepalive" => {
                        if peer.persistent_keepalive.is_some() {
                            return Err(duplicate());
                        }
                        let seconds: u16 = if value.eq_ignore_ascii_case("off") {
                            0
                        } else {
                            parse_number(value).map_err(invalid)?
                        };
                        peer.persistent_keepalive = (seconds > 0).then_some(seconds);
                    }
                    _ => {
                        return Err(ConfigParseError::UnknownKey {
                            line,
                            key: key.to_string(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    fn finish(self, name: String) -> Result<TunnelConfiguration, ConfigParseError> {
        let iface = self.interface.ok_or(ConfigParseError::MissingInterface)?;
        let private_key = iface.private_key.ok_or(ConfigParseError::MissingKey {
            section: "Interface",
            key: "PrivateKey",
        })?;

        let mut peers = Vec::with_capacity(self.peers.len());
        for peer in self.peers {
            let public_key = peer.public_key.ok_or(ConfigParseError::MissingKey {
                section: "Peer",
                key: "PublicKey",
            })?;
            peers.push(PeerConfiguration {
                public_key,
                preshared_key: peer.preshared_key,
                endpoint: peer.endpoint,
                allowed_ips: peer.allowed_ips,
                persistent_keepalive: peer.persistent_keepalive,
            });
        }

        Ok(TunnelConfiguration {
            name,
            interface: InterfaceConfiguration {
                private_key,
                addresses: iface.addresses,
                listen_port: iface.listen_port,
                mtu: iface.mtu,
                dns: iface.dns,
                dns_search: iface.dns_search,
            },
            peers,
        })
    }
}

fn parse_list<T: FromStr<Err = ConfigParseError>>(value: &str) -> Result<Vec<T>, ConfigParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse)
        .collect()
}

fn parse_number(value: &str) -> Result<u16, ConfigParseError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigParseError::InvalidField(format!("{value} is not a number in 0..=65535")))
}
