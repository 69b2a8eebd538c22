//! Server bootstrap: packages, keys, server config, forwarding, firewall,
//! the seed client and the service.
//!
//! Bootstrap always writes fresh state. An existing server config is
//! replaced after a warning, never merged. Any failure aborts the run and
//! leaves whatever was already written in place.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};
use wgadm_wireguard::{
    generate_wg_config, AllowedIp, InterfaceConfigBuilder, KeyPair, PeerConfigBuilder, PublicKey,
};

use crate::allocate::client_name;
use crate::artifacts::{client_root, server_endpoint, ClientArtifacts, ClientProfile, EnrolledClient};
use crate::capabilities::{Capabilities, ServiceAction};
use crate::error::{ProvisionError, Result};
use crate::keystore::KeyStore;
use crate::network::ServerNetwork;
use crate::settings::{Settings, PACKAGES, SERVER_KEY_NAME};
use crate::store::ServerConfigStore;

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    /// Path of the server config.
    pub server_config: PathBuf,
    /// Whether a previous server config was replaced.
    pub replaced_existing: bool,
    /// Server public key.
    pub server_public_key: PublicKey,
    /// Server VPN address.
    pub network: ServerNetwork,
    /// UDP listen port.
    pub listen_port: u16,
    /// Interface used for NAT.
    pub uplink_interface: String,
    /// Packages installed, empty when skipped.
    pub packages: Vec<String>,
    /// Forwarding lines added to the sysctl file.
    pub forwarding_added: Vec<String>,
    /// Whether the firewall had to be enabled.
    pub firewall_enabled: bool,
    /// The seed client.
    pub client: EnrolledClient,
    /// How the service was brought up.
    pub service: ServiceAction,
}

/// `PostUp` commands: accept forwarded tunnel traffic and masquerade it
/// behind `uplink`.
#[must_use]
pub fn post_up_commands(uplink: &str) -> Vec<String> {
    vec![
        "iptables -A FORWARD -i %i -j ACCEPT".to_string(),
        "iptables -A FORWARD -o %i -j ACCEPT".to_string(),
        format!("iptables -t nat -A POSTROUTING -o {uplink} -j MASQUERADE"),
    ]
}

/// `PostDown` commands undoing [`post_up_commands`].
#[must_use]
pub fn post_down_commands(uplink: &str) -> Vec<String> {
    vec![
        "iptables -D FORWARD -i %i -j ACCEPT".to_string(),
        "iptables -D FORWARD -o %i -j ACCEPT".to_string(),
        format!("iptables -t nat -D POSTROUTING -o {uplink} -j MASQUERADE"),
    ]
}

/// Renders the server config with its first peer.
pub fn render_server_config(
    server: &KeyPair,
    network: ServerNetwork,
    listen_port: u16,
    uplink: &str,
    client_key: PublicKey,
    client_address: Ipv4Addr,
) -> Result<String> {
    let peer = PeerConfigBuilder::new()
        .public_key(client_key)
        .allowed_ip(AllowedIp::host_v4(client_address))
        .build()?;

    let mut builder = InterfaceConfigBuilder::new()
        .private_key(server.private_key().clone())
        .address(AllowedIp::from(network.interface_net()))
        .listen_port(listen_port);
    for command in post_up_commands(uplink) {
        builder = builder.post_up(command);
    }
    for command in post_down_commands(uplink) {
        builder = builder.post_down(command);
    }

    Ok(generate_wg_config(&builder.peer(peer).build()?))
}

/// Provisions the server and its first client.
///
/// # Errors
///
/// Fails without touching anything when the caller is not privileged or the
/// first client address would pass `.254`. Later failures abort the run.
pub fn bootstrap(settings: &Settings, caps: &Capabilities) -> Result<BootstrapReport> {
    let host = &*caps.host;
    if !host.is_privileged() {
        return Err(ProvisionError::NotPrivileged);
    }

    let network = settings.server_address;
    let client_address = network.first_client_address()?;

    let store = ServerConfigStore::new(settings.server_config_path());
    let replaced_existing = store.exists();
    if replaced_existing {
        warn!(
            path = %store.path().display(),
            "server config already exists and will be overwritten; existing peers are lost"
        );
    }

    let packages = if settings.install_packages {
        caps.packages.install(PACKAGES)?;
        PACKAGES.iter().map(|p| (*p).to_string()).collect()
    } else {
        info!("skipping package installation");
        Vec::new()
    };

    let keystore = KeyStore::new(&settings.key_dir);
    let server_keys = caps.keys.generate();
    keystore.write_pair(SERVER_KEY_NAME, &server_keys)?;
    let name = client_name(1);
    let client_keys = caps.keys.generate();
    keystore.write_pair(&name, &client_keys)?;

    let uplink = host.default_route_interface().unwrap_or_else(|| {
        warn!(
            fallback = %settings.fallback_interface,
            "could not detect the default route interface"
        );
        settings.fallback_interface.clone()
    });

    let server_config = render_server_config(
        &server_keys,
        network,
        settings.listen_port,
        &uplink,
        *client_keys.public_key(),
        client_address,
    )?;
    store.write(&server_config)?;
    info!(path = %store.path().display(), address = %network, uplink = %uplink, "wrote server config");

    let forwarding_added = caps.forwarding.enable()?;
    let firewall_enabled = caps.firewall.configure(settings.listen_port)?;

    let endpoint = server_endpoint(host, settings.listen_port)?;
    let client_config = ClientProfile {
        keys: &client_keys,
        address: client_address,
        dns: &settings.dns,
        server_key: *server_keys.public_key(),
        endpoint: endpoint.clone(),
        routed: network.subnet_base(),
        keepalive: settings.keepalive,
    }
    .render()?;
    let qr = caps.qr.render(&client_config)?;
    let artifacts = ClientArtifacts::locate(&client_root(settings, host), &name);
    artifacts.write(&client_config, &qr, host)?;
    info!(client = %name, address = %client_address, config = %artifacts.config_path.display(), "wrote client config");

    let unit = settings.service_unit();
    caps.service.enable(&unit)?;
    let service = caps.service.restart_or_start(&unit)?;
    info!(unit = %unit, action = %service, "service up");

    Ok(BootstrapReport {
        server_config: store.path().to_path_buf(),
        replaced_existing,
        server_public_key: *server_keys.public_key(),
        network,
        listen_port: settings.listen_port,
        uplink_interface: uplink,
        packages,
        forwarding_added,
        firewall_enabled,
        client: EnrolledClient {
            name,
            address: client_address,
            public_key: *client_keys.public_key(),
            endpoint,
            artifacts,
            qr_terminal: qr.terminal,
        },
        service,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgadm_wireguard::parse_wg_config;

    #[test]
    fn server_config_layout() {
        let server = KeyPair::generate();
        let client = KeyPair::generate();
        let network: ServerNetwork = "10.0.0.1/24".parse().expect("network");
        let rendered = render_server_config(
            &server,
            network,
            51820,
            "ens3",
            *client.public_key(),
            Ipv4Addr::new(10, 0, 0, 2),
        )
        .expect("render");

        let expected = format!(
            "[Interface]\n\
             PrivateKey = {}\n\
             Address = 10.0.0.1/24\n\
             ListenPort = 51820\n\
             PostUp = iptables -A FORWARD -i %i -j ACCEPT\n\
             PostUp = iptables -A FORWARD -o %i -j ACCEPT\n\
             PostUp = iptables -t nat -A POSTROUTING -o ens3 -j MASQUERADE\n\
             PostDown = iptables -D FORWARD -i %i -j ACCEPT\n\
             PostDown = iptables -D FORWARD -o %i -j ACCEPT\n\
             PostDown = iptables -t nat -D POSTROUTING -o ens3 -j MASQUERADE\n\
             \n\
             [Peer]\n\
             PublicKey = {}\n\
             AllowedIPs = 10.0.0.2/32\n",
            server.private_key().to_base64(),
            client.public_key().to_base64(),
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn reparsed_address_matches_network() {
        let server = KeyPair::generate();
        let client = KeyPair::generate();
        let network: ServerNetwork = "172.16.4.9/20".parse().expect("network");
        let first = network.first_client_address().expect("in range");
        let rendered =
            render_server_config(&server, network, 51820, "eth0", *client.public_key(), first).expect("render");

        let parsed = parse_wg_config(&rendered).expect("parse");
        let address = parsed.first_ipv4_address().expect("address");
        assert_eq!(ServerNetwork::from(address), network);
        assert_eq!(parsed.peers[0].allowed_ips[0].to_cidr(), "172.16.4.10/32");
    }
}
