//! WireGuard configuration file generation and parsing.
//!
//! This module handles the INI-style configuration format read by
//! `wg-quick`. Server and client files share the same model: one
//! `[Interface]` section followed by any number of `[Peer]` sections.

use std::fmt::Write as FmtWrite;
use std::net::{IpAddr, Ipv4Addr};

use ipnet::Ipv4Net;

use crate::error::{Result, WireGuardError};
use crate::keys::{PrivateKey, PublicKey};
use crate::types::{AllowedIp, Endpoint};

/// Configuration for a WireGuard interface.
#[derive(Clone, Debug)]
pub struct InterfaceConfig {
    /// The interface's private key.
    pub private_key: PrivateKey,
    /// IP addresses assigned to this interface.
    pub addresses: Vec<AllowedIp>,
    /// Optional listen port.
    pub listen_port: Option<u16>,
    /// Optional DNS servers.
    pub dns: Vec<IpAddr>,
    /// Commands `wg-quick` runs after bringing the interface up.
    pub post_up: Vec<String>,
    /// Commands `wg-quick` runs after tearing the interface down.
    pub post_down: Vec<String>,
    /// Configured peers, in file order.
    pub peers: Vec<PeerConfig>,
}

impl InterfaceConfig {
    /// Creates a new interface configuration with the given private key.
    #[must_use]
    pub fn new(private_key: PrivateKey) -> Self {
        Self {
            private_key,
            addresses: Vec::new(),
            listen_port: None,
            dns: Vec::new(),
            post_up: Vec::new(),
            post_down: Vec::new(),
            peers: Vec::new(),
        }
    }

    /// Returns the first IPv4 `Address` entry, host bits included.
    #[must_use]
    pub fn first_ipv4_address(&self) -> Option<Ipv4Net> {
        self.addresses.iter().find_map(AllowedIp::as_v4)
    }

    /// Iterates over every IPv4 host address routed to a peer.
    pub fn peer_ipv4_addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.peers
            .iter()
            .flat_map(|peer| peer.allowed_ips.iter())
            .filter_map(AllowedIp::as_v4)
            .map(|net| net.addr())
    }
}

/// Builder for creating `InterfaceConfig`.
#[derive(Default)]
pub struct InterfaceConfigBuilder {
    private_key: Option<PrivateKey>,
    addresses: Vec<AllowedIp>,
    listen_port: Option<u16>,
    dns: Vec<IpAddr>,
    post_up: Vec<String>,
    post_down: Vec<String>,
    peers: Vec<PeerConfig>,
}

impl InterfaceConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the private key.
    #[must_use]
    pub fn private_key(mut self, key: PrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Sets the listen port.
    #[must_use]
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Adds an address.
    #[must_use]
    pub fn address(mut self, address: AllowedIp) -> Self {
        self.addresses.push(address);
        self
    }

    /// Adds a DNS server.
    #[must_use]
    pub fn dns(mut self, server: IpAddr) -> Self {
        self.dns.push(server);
        self
    }

    /// Adds a `PostUp` command.
    #[must_use]
    pub fn post_up(mut self, command: impl Into<String>) -> Self {
        self.post_up.push(command.into());
        self
    }

    /// Adds a `PostDown` command.
    #[must_use]
    pub fn post_down(mut self, command: impl Into<String>) -> Self {
        self.post_down.push(command.into());
        self
    }

    /// Adds a peer.
    #[must_use]
    pub fn peer(mut self, peer: PeerConfig) -> Self {
        self.peers.push(peer);
        self
    }

    /// Builds the `InterfaceConfig`.
    pub fn build(self) -> Result<InterfaceConfig> {
        let private_key = self.private_key.ok_or_else(|| {
            WireGuardError::InvalidConfig("private key is required".to_string())
        })?;

        Ok(InterfaceConfig {
            private_key,
            addresses: self.addresses,
            listen_port: self.listen_port,
            dns: self.dns,
            post_up: self.post_up,
            post_down: self.post_down,
            peers: self.peers,
        })
    }
}

/// Configuration for a WireGuard peer.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// The peer's public key.
    pub public_key: PublicKey,
    /// Optional endpoint.
    pub endpoint: Option<Endpoint>,
    /// Allowed IPs for this peer.
    pub allowed_ips: Vec<AllowedIp>,
    /// Optional persistent keepalive interval.
    pub persistent_keepalive: Option<u16>,
}

impl PeerConfig {
    /// Creates a new peer config with the given public key.
    #[must_use]
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            endpoint: None,
            allowed_ips: Vec::new(),
            persistent_keepalive: None,
        }
    }
}

/// Builder for creating `PeerConfig`.
#[derive(Default)]
pub struct PeerConfigBuilder {
    public_key: Option<PublicKey>,
    endpoint: Option<Endpoint>,
    allowed_ips: Vec<AllowedIp>,
    persistent_keepalive: Option<u16>,
}

impl PeerConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the public key.
    #[must_use]
    pub fn public_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Adds an allowed IP.
    #[must_use]
    pub fn allowed_ip(mut self, ip: AllowedIp) -> Self {
        self.allowed_ips.push(ip);
        self
    }

    /// Sets the persistent keepalive interval.
    #[must_use]
    pub fn persistent_keepalive(mut self, seconds: u16) -> Self {
        self.persistent_keepalive = Some(seconds);
        self
    }

    /// Builds the `PeerConfig`.
    pub fn build(self) -> Result<PeerConfig> {
        let public_key = self.public_key.ok_or_else(|| {
            WireGuardError::InvalidConfig("public key is required".to_string())
        })?;

        Ok(PeerConfig {
            public_key,
            endpoint: self.endpoint,
            allowed_ips: self.allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}

/// Generates a WireGuard configuration file from an `InterfaceConfig`.
#[must_use]
pub fn generate_wg_config(config: &InterfaceConfig) -> String {
    let mut output = String::new();

    output.push_str("[Interface]\n");
    let _ = writeln!(output, "PrivateKey = {}", config.private_key.to_base64());

    for addr in &config.addresses {
        let _ = writeln!(output, "Address = {}", addr.to_cidr());
    }

    if let Some(port) = config.listen_port {
        let _ = writeln!(output, "ListenPort = {port}");
    }

    if !config.dns.is_empty() {
        let dns_str: Vec<String> = config.dns.iter().map(ToString::to_string).collect();
        let _ = writeln!(output, "DNS = {}", dns_str.join(", "));
    }

    for command in &config.post_up {
        let _ = writeln!(output, "PostUp = {command}");
    }

    for command in &config.post_down {
        let _ = writeln!(output, "PostDown = {command}");
    }

    for peer in &config.peers {
        output.push('\n');
        output.push_str(&generate_peer_section(peer));
    }

    output
}

/// Generates a single `[Peer]` section, suitable for appending to an
/// existing configuration file.
#[must_use]
pub fn generate_peer_section(peer: &PeerConfig) -> String {
    let mut output = String::from("[Peer]\n");
    let _ = writeln!(output, "PublicKey = {}", peer.public_key.to_base64());

    if let Some(ref endpoint) = peer.endpoint {
        let _ = writeln!(output, "Endpoint = {endpoint}");
    }

    if !peer.allowed_ips.is_empty() {
        let ips: Vec<String> = peer.allowed_ips.iter().map(AllowedIp::to_cidr).collect();
        let _ = writeln!(output, "AllowedIPs = {}", ips.join(", "));
    }

    if let Some(keepalive) = peer.persistent_keepalive {
        let _ = writeln!(output, "PersistentKeepalive = {keepalive}");
    }

    output
}

/// Parser state for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
}

/// Parses a WireGuard configuration file.
pub fn parse_wg_config(config_str: &str) -> Result<InterfaceConfig> {
    let mut section = Section::None;
    let mut interface = ParsedInterface::default();
    let mut peers: Vec<PeerConfig> = Vec::new();
    let mut current_peer: Option<ParsedPeer> = None;

    for (line_num, line) in config_str.lines().enumerate() {
        let line = line.trim();
        let line_number = line_num + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(peer) = current_peer.take() {
                peers.push(peer.build()?);
            }

            let section_name = &line[1..line.len() - 1];
            section = match section_name {
                "Interface" => Section::Interface,
                "Peer" => {
                    current_peer = Some(ParsedPeer::new(line_number));
                    Section::Peer
                }
                _ => {
                    return Err(WireGuardError::ParseError {
                        line: line_number,
                        message: format!("unknown section: {section_name}"),
                    });
                }
            };
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(WireGuardError::ParseError {
                line: line_number,
                message: format!("invalid line format: {line}"),
            });
        };

        let key = key.trim();
        let value = value.trim();

        match section {
            Section::None => {
                return Err(WireGuardError::ParseError {
                    line: line_number,
                    message: "key-value pair outside of section".to_string(),
                });
            }
            Section::Interface => interface.parse_key(key, value, line_number)?,
            Section::Peer => {
                if let Some(ref mut peer) = current_peer {
                    peer.parse_key(key, value, line_number)?;
                }
            }
        }
    }

    if let Some(peer) = current_peer {
        peers.push(peer.build()?);
    }

    interface.build(peers)
}

fn parse_error(line: usize, message: impl Into<String>) -> WireGuardError {
    WireGuardError::ParseError {
        line,
        message: message.into(),
    }
}

/// Accumulates `[Interface]` keys during parsing.
#[derive(Default)]
struct ParsedInterface {
    private_key: Option<PrivateKey>,
    addresses: Vec<AllowedIp>,
    listen_port: Option<u16>,
    dns: Vec<IpAddr>,
    post_up: Vec<String>,
    post_down: Vec<String>,
}

impl ParsedInterface {
    fn parse_key(&mut self, key: &str, value: &str, line_number: usize) -> Result<()> {
        match key {
            "PrivateKey" => {
                self.private_key = Some(
                    PrivateKey::from_base64(value)
                        .map_err(|_| parse_error(line_number, "invalid PrivateKey"))?,
                );
            }
            "ListenPort" => {
                self.listen_port = Some(
                    value
                        .parse()
                        .map_err(|_| parse_error(line_number, "invalid ListenPort"))?,
                );
            }
            "Address" => {
                for addr in value.split(',') {
                    self.addresses.push(
                        AllowedIp::from_cidr(addr.trim())
                            .map_err(|_| parse_error(line_number, format!("invalid Address: {addr}")))?,
                    );
                }
            }
            "DNS" => {
                for addr in value.split(',') {
                    self.dns.push(
                        addr.trim()
                            .parse()
                            .map_err(|_| parse_error(line_number, format!("invalid DNS address: {addr}")))?,
                    );
                }
            }
            "PostUp" => self.post_up.push(value.to_string()),
            "PostDown" => self.post_down.push(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn build(self, peers: Vec<PeerConfig>) -> Result<InterfaceConfig> {
        let private_key = self
            .private_key
            .ok_or_else(|| parse_error(0, "missing PrivateKey in [Interface] section"))?;

        Ok(InterfaceConfig {
            private_key,
            addresses: self.addresses,
            listen_port: self.listen_port,
            dns: self.dns,
            post_up: self.post_up,
            post_down: self.post_down,
            peers,
        })
    }
}

/// Accumulates `[Peer]` keys during parsing.
struct ParsedPeer {
    header_line: usize,
    public_key: Option<PublicKey>,
    endpoint: Option<Endpoint>,
    allowed_ips: Vec<AllowedIp>,
    persistent_keepalive: Option<u16>,
}

impl ParsedPeer {
    fn new(header_line: usize) -> Self {
        Self {
            header_line,
            public_key: None,
            endpoint: None,
            allowed_ips: Vec::new(),
            persistent_keepalive: None,
        }
    }

    fn parse_key(&mut self, key: &str, value: &str, line_number: usize) -> Result<()> {
        match key {
            "PublicKey" => {
                self.public_key = Some(
                    PublicKey::from_base64(value)
                        .map_err(|_| parse_error(line_number, "invalid PublicKey"))?,
                );
            }
            "AllowedIPs" => {
                for ip in value.split(',').map(str::trim).filter(|ip| !ip.is_empty()) {
                    self.allowed_ips.push(
                        AllowedIp::from_cidr(ip)
                            .map_err(|_| parse_error(line_number, format!("invalid AllowedIPs: {ip}")))?,
                    );
                }
            }
            "Endpoint" => {
                self.endpoint = Some(
                    value
                        .parse()
                        .map_err(|_| parse_error(line_number, format!("invalid Endpoint: {value}")))?,
                );
            }
            "PersistentKeepalive" => {
                self.persistent_keepalive = Some(
                    value
                        .parse()
                        .map_err(|_| parse_error(line_number, "invalid PersistentKeepalive"))?,
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> Result<PeerConfig> {
        let public_key = self
            .public_key
            .ok_or_else(|| parse_error(self.header_line, "missing PublicKey in [Peer] section"))?;

        Ok(PeerConfig {
            public_key,
            endpoint: self.endpoint,
            allowed_ips: self.allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}
