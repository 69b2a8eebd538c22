//! Client-facing artifacts: the client config and its QR code.

use std::fs::{self, Permissions};
use std::net::{IpAddr, Ipv4Addr};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use ipnet::Ipv4Net;
use serde::Serialize;
use tracing::{debug, warn};
use wgadm_wireguard::{
    generate_wg_config, AllowedIp, Endpoint, InterfaceConfigBuilder, KeyPair, PeerConfigBuilder, PublicKey,
};

use crate::error::{ProvisionError, Result};
use crate::host::HostProbe;
use crate::qr::RenderedQr;
use crate::settings::{Settings, PUBLIC_IP_PLACEHOLDER};
use crate::store::write_atomic;

/// Mode of the per-client directory.
pub const CLIENT_DIR_MODE: u32 = 0o700;

/// Mode of client config and QR files.
pub const CLIENT_FILE_MODE: u32 = 0o600;

/// The server endpoint clients dial.
///
/// Falls back to [`PUBLIC_IP_PLACEHOLDER`] with a warning when the public
/// address cannot be detected.
pub fn server_endpoint(host: &dyn HostProbe, port: u16) -> Result<Endpoint> {
    if let Some(ip) = host.public_ipv4() {
        return Ok(Endpoint::from_ip_port(IpAddr::V4(ip), port));
    }
    warn!(
        placeholder = PUBLIC_IP_PLACEHOLDER,
        "could not detect the server's public IPv4 address; edit Endpoint in the client config"
    );
    Ok(Endpoint::from_name_port(PUBLIC_IP_PLACEHOLDER, port)?)
}

/// Everything a client config is rendered from.
#[derive(Debug)]
pub struct ClientProfile<'a> {
    /// Client key pair.
    pub keys: &'a KeyPair,
    /// Client VPN address.
    pub address: Ipv4Addr,
    /// DNS servers.
    pub dns: &'a [IpAddr],
    /// Server public key.
    pub server_key: PublicKey,
    /// Server endpoint.
    pub endpoint: Endpoint,
    /// Subnet routed through the tunnel.
    pub routed: Ipv4Net,
    /// Keepalive in seconds.
    pub keepalive: u16,
}

impl ClientProfile<'_> {
    /// Renders the client's `wg-quick` config.
    pub fn render(&self) -> Result<String> {
        let peer = PeerConfigBuilder::new()
            .public_key(self.server_key)
            .endpoint(self.endpoint.clone())
            .allowed_ip(AllowedIp::from(self.routed))
            .persistent_keepalive(self.keepalive)
            .build()?;

        let mut builder = InterfaceConfigBuilder::new()
            .private_key(self.keys.private_key().clone())
            .address(AllowedIp::host_v4(self.address));
        for server in self.dns {
            builder = builder.dns(*server);
        }
        let config = builder.peer(peer).build()?;

        Ok(generate_wg_config(&config))
    }
}

/// Root directory for client artifacts: the configured one, or
/// `wireguard-clients` in the invoking user's home.
#[must_use]
pub fn client_root(settings: &Settings, host: &dyn HostProbe) -> PathBuf {
    let home = host
        .invoking_user()
        .map_or_else(|| host.home_dir(), |user| user.home);
    settings.client_root(&home)
}

/// A client created by bootstrap or enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrolledClient {
    /// `client<N>`.
    pub name: String,
    /// VPN address.
    pub address: Ipv4Addr,
    /// Client public key.
    pub public_key: PublicKey,
    /// Endpoint written into the client config.
    pub endpoint: Endpoint,
    /// Files written for the client.
    pub artifacts: ClientArtifacts,
    /// Terminal rendering of the QR code.
    #[serde(skip)]
    pub qr_terminal: String,
}

/// Where a client's artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientArtifacts {
    /// `<client-root>/<name>`.
    pub dir: PathBuf,
    /// `<name>.conf`.
    pub config_path: PathBuf,
    /// `<name>.svg`.
    pub qr_path: PathBuf,
}

impl ClientArtifacts {
    /// Artifact paths for `name` under `root`.
    #[must_use]
    pub fn locate(root: &Path, name: &str) -> Self {
        let dir = root.join(name);
        Self {
            config_path: dir.join(format!("{name}.conf")),
            qr_path: dir.join(format!("{name}.svg")),
            dir,
        }
    }

    /// Writes the config and QR code, then hands the files to the invoking
    /// user when there is one.
    pub fn write(&self, config: &str, qr: &RenderedQr, host: &dyn HostProbe) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| ProvisionError::io(&self.dir, e))?;
        fs::set_permissions(&self.dir, Permissions::from_mode(CLIENT_DIR_MODE))
            .map_err(|e| ProvisionError::io(&self.dir, e))?;

        write_atomic(&self.config_path, config, CLIENT_FILE_MODE)?;
        write_atomic(&self.qr_path, &qr.svg, CLIENT_FILE_MODE)?;

        if let Some(user) = host.invoking_user() {
            let mut owned: Vec<&Path> = self.dir.parent().into_iter().collect();
            owned.extend([self.dir.as_path(), self.config_path.as_path(), self.qr_path.as_path()]);
            for path in owned {
                host.hand_over(path, &user)?;
            }
            debug!(user = %user.name, dir = %self.dir.display(), "handed over client artifacts");
        }
        Ok(())
    }
}
