//! Shared fixtures for the procedure tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use wgadm_provision::fake::FakeSystem;
use wgadm_provision::keystore::KeyStore;
use wgadm_provision::{Capabilities, ServerNetwork, Settings};
use wgadm_wireguard::{generate_peer_section, AllowedIp, KeyPair, PeerConfig};

/// A throwaway filesystem root with settings and fakes pointing into it.
pub struct Sandbox {
    pub dir: TempDir,
    pub settings: Settings,
    pub fakes: FakeSystem,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let settings = Settings {
            config_dir: root.join("etc/wireguard"),
            key_dir: root.join("etc/wireguard/keys"),
            sysctl_path: root.join("etc/sysctl.conf"),
            ..Settings::default()
        };
        let fakes = FakeSystem::new(root.join("home/root"));
        Self { dir, settings, fakes }
    }

    pub fn caps(&self) -> Capabilities {
        self.fakes.capabilities()
    }

    pub fn keystore(&self) -> KeyStore {
        KeyStore::new(&self.settings.key_dir)
    }

    pub fn server_config_path(&self) -> PathBuf {
        self.settings.server_config_path()
    }

    pub fn server_config(&self) -> String {
        fs::read_to_string(self.server_config_path()).expect("read server config")
    }

    pub fn client_root(&self) -> PathBuf {
        self.fakes.host.home.join("wireguard-clients")
    }

    pub fn client_config(&self, name: &str) -> String {
        fs::read_to_string(self.client_root().join(name).join(format!("{name}.conf"))).expect("read client config")
    }

    /// Writes a server config by hand, plus the server key files.
    pub fn seed_server(&self, config: &str) -> KeyPair {
        fs::create_dir_all(&self.settings.config_dir).expect("config dir");
        fs::write(self.server_config_path(), config).expect("write server config");
        let server = KeyPair::generate();
        self.keystore().write_pair("server", &server).expect("server keys");
        server
    }
}

/// A server config for `10.0.0.<server>/24` with peers at the given octets.
pub fn server_config_with_peers(server: u8, octets: impl IntoIterator<Item = u8>) -> String {
    server_config_in(&format!("10.0.0.{server}/24"), octets)
}

/// A server config with the given `Address` and peers at the given last
/// octets of the same /24.
pub fn server_config_in(address: &str, octets: impl IntoIterator<Item = u8>) -> String {
    let network: ServerNetwork = address.parse().expect("valid server address");
    let mut text = format!(
        "[Interface]\nPrivateKey = {}\nAddress = {address}\nListenPort = 51820\n",
        KeyPair::generate().private_key().to_base64()
    );
    for octet in octets {
        let mut peer = PeerConfig::new(*KeyPair::generate().public_key());
        peer.allowed_ips.push(AllowedIp::host_v4(network.host_with_octet(octet)));
        text.push('\n');
        text.push_str(&generate_peer_section(&peer));
    }
    text
}

pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).expect("metadata").permissions().mode() & 0o777
}
