//! Core types for `WireGuard` configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WireGuardError};

/// An allowed IP address or network in CIDR notation.
///
/// Host bits are preserved, so `10.0.0.1/24` round-trips as written. This is
/// what an `[Interface] Address` line needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowedIp {
    network: IpNet,
}

impl AllowedIp {
    /// Creates a new allowed IP from an `IpNet`.
    #[must_use]
    pub const fn new(network: IpNet) -> Self {
        Self { network }
    }

    /// A single IPv4 host (`/32`).
    #[must_use]
    pub fn host_v4(addr: Ipv4Addr) -> Self {
        Self {
            network: IpNet::V4(Ipv4Net::from(addr)),
        }
    }

    /// Returns the network.
    #[must_use]
    pub const fn network(&self) -> &IpNet {
        &self.network
    }

    /// Returns the IPv4 network, if this is an IPv4 entry.
    #[must_use]
    pub fn as_v4(&self) -> Option<Ipv4Net> {
        match self.network {
            IpNet::V4(net) => Some(net),
            IpNet::V6(_) => None,
        }
    }

    /// Creates an allowed IP from CIDR notation.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR notation is invalid.
    pub fn from_cidr(s: &str) -> Result<Self> {
        let network = s.parse::<IpNet>().map_err(|e| WireGuardError::InvalidCidr(format!("{s}: {e}")))?;
        Ok(Self { network })
    }

    /// Returns the CIDR string representation.
    #[must_use]
    pub fn to_cidr(&self) -> String {
        self.network.to_string()
    }
}

impl From<Ipv4Net> for AllowedIp {
    fn from(net: Ipv4Net) -> Self {
        Self {
            network: IpNet::V4(net),
        }
    }
}

impl FromStr for AllowedIp {
    type Err = WireGuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cidr(s)
    }
}

impl fmt::Display for AllowedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.network)
    }
}

/// Host part of an endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointHost {
    /// A literal IP address.
    Ip(IpAddr),
    /// A DNS name, or a placeholder the operator is expected to edit.
    Name(String),
}

impl fmt::Display for EndpointHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(IpAddr::V6(ip)) => write!(f, "[{ip}]"),
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A `WireGuard` peer endpoint (`host:port`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: EndpointHost,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint from an IP address and port.
    #[must_use]
    pub const fn from_ip_port(ip: IpAddr, port: u16) -> Self {
        Self {
            host: EndpointHost::Ip(ip),
            port,
        }
    }

    /// Creates an endpoint from a host name and port.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains whitespace or `:`.
    pub fn from_name_port(name: &str, port: u16) -> Result<Self> {
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == ':' || c == ',') {
            return Err(WireGuardError::InvalidEndpoint(format!("invalid host name: {name:?}")));
        }
        Ok(Self {
            host: EndpointHost::Name(name.to_string()),
            port,
        })
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = WireGuardError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(address) = s.parse::<SocketAddr>() {
            return Ok(Self::from_ip_port(address.ip(), address.port()));
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| WireGuardError::InvalidEndpoint(format!("missing port: {s}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| WireGuardError::InvalidEndpoint(format!("{s}: {e}")))?;
        Self::from_name_port(host, port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
