//! Client enrollment and listing.
//!
//! Enrollment adds exactly one peer to a bootstrapped server. Preconditions
//! (privilege, server config, server public key) are checked before anything
//! is written. The server config lock is held from reading the peer list
//! until the new peer is appended, so concurrent runs never hand out the
//! same address.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;
use wgadm_wireguard::{generate_peer_section, AllowedIp, PeerConfigBuilder, PublicKey};

use crate::allocate::{allocate, AllocationStrategy};
use crate::artifacts::{client_root, server_endpoint, ClientArtifacts, ClientProfile, EnrolledClient};
use crate::capabilities::{Capabilities, ServiceAction};
use crate::error::{ProvisionError, Result};
use crate::keystore::KeyStore;
use crate::network::ServerNetwork;
use crate::settings::{Settings, DEFAULT_LISTEN_PORT, SERVER_KEY_NAME};
use crate::store::ServerConfigStore;

/// Outcome of an enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReport {
    /// Path of the server config.
    pub server_config: PathBuf,
    /// Server VPN address.
    pub network: ServerNetwork,
    /// Strategy used to pick the address.
    pub strategy: AllocationStrategy,
    /// Peers present before this enrollment.
    pub existing_peers: usize,
    /// The new client.
    pub client: EnrolledClient,
    /// How the service was brought up.
    pub service: ServiceAction,
}

/// Enrolls one new client against the bootstrapped server.
///
/// # Errors
///
/// - [`ProvisionError::NotPrivileged`], [`ProvisionError::MissingServerConfig`]
///   or [`ProvisionError::MissingServerKey`] before any change
/// - [`ProvisionError::Parse`] or [`ProvisionError::MissingAddress`] if the
///   server config is unusable
/// - [`ProvisionError::AddressExhausted`] when no address is left; the
///   server config is left untouched, though its empty `.lock` sibling has
///   already been created by then and stays behind
pub fn enroll(settings: &Settings, caps: &Capabilities) -> Result<EnrollmentReport> {
    let host = &*caps.host;
    if !host.is_privileged() {
        return Err(ProvisionError::NotPrivileged);
    }

    let store = ServerConfigStore::new(settings.server_config_path());
    if !store.exists() {
        return Err(ProvisionError::MissingServerConfig(store.path().to_path_buf()));
    }
    let keystore = KeyStore::new(&settings.key_dir);
    let server_key_path = keystore.public_path(SERVER_KEY_NAME);
    if !server_key_path.exists() {
        return Err(ProvisionError::MissingServerKey(server_key_path));
    }

    let lock = store.lock()?;
    let loaded = store.load()?;
    let existing_peers = loaded.peer_count();

    let allocation = allocate(&loaded.network, &loaded.config, settings.allocation, |name| {
        keystore.has(name)
    })?;
    let name = allocation.name();
    info!(
        client = %name,
        address = %allocation.address,
        peers = existing_peers,
        strategy = %settings.allocation,
        "allocated client"
    );

    let client_keys = caps.keys.generate();
    keystore.write_pair(&name, &client_keys)?;

    let server_key = keystore.read_public(SERVER_KEY_NAME)?;
    let port = loaded.config.listen_port.unwrap_or(DEFAULT_LISTEN_PORT);
    let endpoint = server_endpoint(host, port)?;

    let peer = PeerConfigBuilder::new()
        .public_key(*client_keys.public_key())
        .allowed_ip(AllowedIp::host_v4(allocation.address))
        .build()?;
    store.append_peer(&loaded, &generate_peer_section(&peer))?;
    drop(lock);
    info!(path = %store.path().display(), client = %name, "appended peer");

    let client_config = ClientProfile {
        keys: &client_keys,
        address: allocation.address,
        dns: &settings.dns,
        server_key,
        endpoint: endpoint.clone(),
        routed: loaded.network.subnet_base(),
        keepalive: settings.keepalive,
    }
    .render()?;
    let qr = caps.qr.render(&client_config)?;
    let artifacts = ClientArtifacts::locate(&client_root(settings, host), &name);
    artifacts.write(&client_config, &qr, host)?;
    info!(client = %name, config = %artifacts.config_path.display(), "wrote client config");

    let unit = settings.service_unit();
    let service = caps.service.restart_or_start(&unit)?;
    info!(unit = %unit, action = %service, "service up");

    Ok(EnrollmentReport {
        server_config: store.path().to_path_buf(),
        network: loaded.network,
        strategy: settings.allocation,
        existing_peers,
        client: EnrolledClient {
            name,
            address: allocation.address,
            public_key: *client_keys.public_key(),
            endpoint,
            artifacts,
            qr_terminal: qr.terminal,
        },
        service,
    })
}

/// One peer of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEntry {
    /// Position in the config, starting at 1.
    pub position: usize,
    /// Name of the matching key files, if any.
    pub name: Option<String>,
    /// Peer public key.
    pub public_key: PublicKey,
    /// First IPv4 address routed to the peer.
    pub address: Option<Ipv4Addr>,
    /// Every `AllowedIPs` entry.
    pub allowed_ips: Vec<String>,
}

/// Peers of the server config in file order.
///
/// Names are recovered by matching public keys against the key directory.
pub fn list_clients(settings: &Settings) -> Result<Vec<ClientEntry>> {
    let store = ServerConfigStore::new(settings.server_config_path());
    let loaded = store.load()?;
    let names = KeyStore::new(&settings.key_dir).names_by_public_key()?;

    Ok(loaded
        .config
        .peers
        .iter()
        .enumerate()
        .map(|(i, peer)| ClientEntry {
            position: i + 1,
            name: names.get(&peer.public_key).cloned(),
            public_key: peer.public_key,
            address: peer
                .allowed_ips
                .iter()
                .find_map(AllowedIp::as_v4)
                .map(|net| net.addr()),
            allowed_ips: peer.allowed_ips.iter().map(AllowedIp::to_cidr).collect(),
        })
        .collect())
}
