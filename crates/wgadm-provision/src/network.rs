//! The server's private network descriptor.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

/// Highest last octet handed out to a client.
pub const MAX_HOST_OCTET: u8 = 254;

/// The VPN interface address of the server, e.g. `10.0.0.1/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerNetwork {
    interface: Ipv4Net,
}

impl ServerNetwork {
    /// Creates a descriptor from an address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is longer than 32.
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self> {
        let interface = Ipv4Net::new(address, prefix)
            .map_err(|e| ProvisionError::InvalidAddress(format!("{address}/{prefix}: {e}")))?;
        Ok(Self { interface })
    }

    /// The server's own address.
    #[must_use]
    pub fn address(&self) -> Ipv4Addr {
        self.interface.addr()
    }

    /// The prefix length.
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.interface.prefix_len()
    }

    /// The address/prefix as written in the `[Interface]` section.
    #[must_use]
    pub fn interface_net(&self) -> Ipv4Net {
        self.interface
    }

    /// The server's last octet.
    #[must_use]
    pub fn last_octet(&self) -> u8 {
        self.address().octets()[3]
    }

    /// The network address with the same prefix, e.g. `10.0.0.0/24`.
    ///
    /// Clients use this as their `AllowedIPs` to route the whole VPN subnet.
    #[must_use]
    pub fn subnet_base(&self) -> Ipv4Net {
        self.interface.trunc()
    }

    /// The address sharing the server's first three octets with the given
    /// last octet.
    #[must_use]
    pub fn host_with_octet(&self, octet: u8) -> Ipv4Addr {
        let [a, b, c, _] = self.address().octets();
        Ipv4Addr::new(a, b, c, octet)
    }

    /// Whether `addr` lies inside the server's subnet.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.subnet_base().contains(&addr)
    }

    /// Highest last octet a client may take.
    ///
    /// Capped at `.254` and kept below the subnet's broadcast address when
    /// the broadcast shares the server's first three octets.
    #[must_use]
    pub fn highest_client_octet(&self) -> u8 {
        let broadcast = self.subnet_base().broadcast().octets();
        let [a, b, c, _] = self.address().octets();
        if broadcast[..3] == [a, b, c] {
            broadcast[3].saturating_sub(1).min(MAX_HOST_OCTET)
        } else {
            MAX_HOST_OCTET
        }
    }

    /// Whether `addr` can be handed to a client: inside the subnet and
    /// neither its network nor its broadcast address.
    #[must_use]
    pub fn is_client_host(&self, addr: Ipv4Addr) -> bool {
        let subnet = self.subnet_base();
        subnet.contains(&addr) && addr != subnet.network() && addr != subnet.broadcast()
    }

    /// The seed client's address: server address with the last octet
    /// incremented by one.
    ///
    /// # Errors
    ///
    /// Returns an error if the result would exceed `.254`.
    pub fn first_client_address(&self) -> Result<Ipv4Addr> {
        let octet = u16::from(self.last_octet()) + 1;
        if octet > u16::from(MAX_HOST_OCTET) {
            return Err(ProvisionError::exhausted(octet, MAX_HOST_OCTET, self));
        }
        Ok(self.host_with_octet(octet as u8))
    }
}

impl FromStr for ServerNetwork {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ProvisionError::InvalidAddress(format!("{s}: missing /prefix")))?;
        let address: Ipv4Addr = addr
            .parse()
            .map_err(|_| ProvisionError::InvalidAddress(format!("{s}: not a dotted-quad IPv4 address")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ProvisionError::InvalidAddress(format!("{s}: prefix is not a number")))?;
        Self::new(address, prefix)
    }
}

impl From<Ipv4Net> for ServerNetwork {
    fn from(interface: Ipv4Net) -> Self {
        Self { interface }
    }
}

impl TryFrom<String> for ServerNetwork {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ServerNetwork> for String {
    fn from(network: ServerNetwork) -> Self {
        network.to_string()
    }
}

impl fmt::Display for ServerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interface)
    }
}
