//! Tunables for bootstrap and enrollment.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allocate::AllocationStrategy;
use crate::network::ServerNetwork;

/// Default UDP port the server listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 51820;

/// Keepalive written into every client config, in seconds.
pub const DEFAULT_KEEPALIVE: u16 = 25;

/// Interface used for NAT rules when the default route cannot be read.
pub const FALLBACK_INTERFACE: &str = "eth0";

/// Endpoint host written when the public address cannot be detected.
pub const PUBLIC_IP_PLACEHOLDER: &str = "YOUR_SERVER_PUBLIC_IP";

/// Key file name stem of the server identity.
pub const SERVER_KEY_NAME: &str = "server";

/// Directory under the invoking user's home holding client artifacts.
pub const CLIENT_DIR_NAME: &str = "wireguard-clients";

/// Packages installed during bootstrap.
pub const PACKAGES: &[&str] = &["wireguard", "wireguard-tools", "ufw"];

/// Operator settings shared by every procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `<interface>.conf`.
    pub config_dir: PathBuf,
    /// WireGuard interface name, e.g. `wg0`.
    pub interface: String,
    /// Directory holding key files.
    pub key_dir: PathBuf,
    /// Root directory for client artifacts. `None` means
    /// `<home of invoking user>/wireguard-clients`.
    pub client_dir: Option<PathBuf>,
    /// Server VPN address written at bootstrap.
    pub server_address: ServerNetwork,
    /// Server listen port.
    pub listen_port: u16,
    /// DNS servers pushed to clients.
    pub dns: Vec<IpAddr>,
    /// Client keepalive in seconds.
    pub keepalive: u16,
    /// Client address allocation strategy.
    pub allocation: AllocationStrategy,
    /// Interface name used when route detection fails.
    pub fallback_interface: String,
    /// Whether bootstrap installs packages.
    pub install_packages: bool,
    /// Kernel parameter file receiving the forwarding lines.
    pub sysctl_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/wireguard"),
            interface: "wg0".to_string(),
            key_dir: PathBuf::from("/etc/wireguard/keys"),
            client_dir: None,
            server_address: ServerNetwork::from(
                ipnet::Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 1), 24).unwrap_or_default(),
            ),
            listen_port: DEFAULT_LISTEN_PORT,
            dns: vec![
                IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            ],
            keepalive: DEFAULT_KEEPALIVE,
            allocation: AllocationStrategy::default(),
            fallback_interface: FALLBACK_INTERFACE.to_string(),
            install_packages: true,
            sysctl_path: PathBuf::from("/etc/sysctl.conf"),
        }
    }
}

impl Settings {
    /// Path of the server configuration, `<config-dir>/<interface>.conf`.
    #[must_use]
    pub fn server_config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    /// The systemd unit running the interface.
    #[must_use]
    pub fn service_unit(&self) -> String {
        format!("wg-quick@{}", self.interface)
    }

    /// Root directory for client artifacts given the invoking user's home.
    #[must_use]
    pub fn client_root(&self, home: &Path) -> PathBuf {
        self.client_dir
            .clone()
            .unwrap_or_else(|| home.join(CLIENT_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let settings = Settings::default();
        assert_eq!(settings.server_config_path(), PathBuf::from("/etc/wireguard/wg0.conf"));
        assert_eq!(settings.service_unit(), "wg-quick@wg0");
        assert_eq!(settings.server_address.to_string(), "10.0.0.1/24");
        assert_eq!(settings.listen_port, 51820);
        assert_eq!(settings.allocation, AllocationStrategy::LowestFree);
    }

    #[test]
    fn interface_name_drives_paths() {
        let settings = Settings {
            interface: "wg1".to_string(),
            config_dir: PathBuf::from("/tmp/wg"),
            ..Settings::default()
        };
        assert_eq!(settings.server_config_path(), PathBuf::from("/tmp/wg/wg1.conf"));
        assert_eq!(settings.service_unit(), "wg-quick@wg1");
    }

    #[test]
    fn client_root_defaults_to_home() {
        let settings = Settings::default();
        assert_eq!(
            settings.client_root(Path::new("/home/alice")),
            PathBuf::from("/home/alice/wireguard-clients")
        );

        let settings = Settings {
            client_dir: Some(PathBuf::from("/srv/clients")),
            ..Settings::default()
        };
        assert_eq!(settings.client_root(Path::new("/home/alice")), PathBuf::from("/srv/clients"));
    }
}
