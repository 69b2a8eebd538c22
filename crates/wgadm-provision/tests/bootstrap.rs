//! Server bootstrap tests
//!
//! Bootstrap runs against a temporary filesystem with every external tool
//! replaced by a recording fake.

mod helpers;

use std::fs;
use std::net::Ipv4Addr;

use helpers::{mode_of, Sandbox};
use wgadm_provision::fake::FakePackageManager;
use wgadm_provision::{bootstrap, ErrorKind, ProvisionError, ServerNetwork, ServiceAction};
use wgadm_wireguard::parse_wg_config;

// ============================================================================
// Test: Full run
// ============================================================================

#[test]
fn test_bootstrap_writes_server_and_first_client() {
    let sandbox = Sandbox::new();

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    assert!(!report.replaced_existing);
    assert_eq!(report.client.name, "client1");
    assert_eq!(report.client.address, Ipv4Addr::new(10, 0, 0, 2));
    assert_eq!(report.uplink_interface, "eth0");
    assert_eq!(report.service, ServiceAction::Started);

    let server = parse_wg_config(&sandbox.server_config()).expect("parse server config");
    assert_eq!(server.listen_port, Some(51820));
    assert_eq!(server.peers.len(), 1);
    assert_eq!(server.peers[0].public_key, report.client.public_key);
    assert_eq!(server.peers[0].allowed_ips[0].to_cidr(), "10.0.0.2/32");
    assert!(server.post_up.iter().any(|c| c.contains("POSTROUTING -o eth0 -j MASQUERADE")));
    assert!(server.post_down.iter().any(|c| c.contains("POSTROUTING -o eth0 -j MASQUERADE")));
    assert_eq!(server.private_key.public_key(), report.server_public_key);

    let client = parse_wg_config(&sandbox.client_config("client1")).expect("parse client config");
    assert_eq!(client.addresses[0].to_cidr(), "10.0.0.2/32");
    assert_eq!(client.peers[0].public_key, report.server_public_key);
    assert_eq!(client.peers[0].allowed_ips[0].to_cidr(), "10.0.0.0/24");
    assert_eq!(
        client.peers[0].endpoint.as_ref().map(ToString::to_string).as_deref(),
        Some("203.0.113.10:51820")
    );
}

#[test]
fn test_bootstrap_drives_host_tools() {
    let sandbox = Sandbox::new();

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    assert_eq!(sandbox.fakes.packages.installed(), vec!["wireguard", "wireguard-tools", "ufw"]);
    assert_eq!(report.packages.len(), 3);
    assert_eq!(sandbox.fakes.firewall.ports(), vec![51820]);
    assert!(sandbox.fakes.firewall.is_active());
    assert!(report.firewall_enabled);
    assert_eq!(sandbox.fakes.forwarding.calls(), 1);
    assert_eq!(report.forwarding_added.len(), 2);
    assert_eq!(
        sandbox.fakes.service.actions(),
        vec!["enable wg-quick@wg0", "start wg-quick@wg0"]
    );
    assert_eq!(sandbox.fakes.qr.rendered(), vec![sandbox.client_config("client1")]);
    assert_eq!(sandbox.fakes.keys.generated().len(), 2);
}

#[test]
fn test_bootstrap_file_modes() {
    let sandbox = Sandbox::new();
    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");
    let keystore = sandbox.keystore();

    for name in ["server", "client1"] {
        assert_eq!(mode_of(&keystore.private_path(name)), 0o600, "{name} private");
        assert_eq!(mode_of(&keystore.public_path(name)), 0o644, "{name} public");
    }
    assert_eq!(mode_of(&sandbox.server_config_path()), 0o600);
    assert_eq!(mode_of(&report.client.artifacts.config_path), 0o600);
    assert_eq!(keystore.read_public("server").expect("read"), report.server_public_key);
}

#[test]
fn test_reparsed_address_matches_first_peer() {
    let mut sandbox = Sandbox::new();
    sandbox.settings.server_address = "192.168.77.20/24".parse().expect("network");
    sandbox.settings.listen_port = 4500;

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    let server = parse_wg_config(&sandbox.server_config()).expect("parse");
    let network = ServerNetwork::from(server.first_ipv4_address().expect("address"));
    assert_eq!(network, sandbox.settings.server_address);
    assert_eq!(server.peers[0].allowed_ips[0].to_cidr(), "192.168.77.21/32");
    assert_eq!(report.client.endpoint.port(), 4500);
    assert!(sandbox.client_config("client1").contains("AllowedIPs = 192.168.77.0/24\n"));
}

// ============================================================================
// Test: Options and degradation
// ============================================================================

#[test]
fn test_skip_packages() {
    let mut sandbox = Sandbox::new();
    sandbox.settings.install_packages = false;

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    assert!(report.packages.is_empty());
    assert!(sandbox.fakes.packages.installed().is_empty());
}

#[test]
fn test_detected_uplink_is_used_for_nat() {
    let mut sandbox = Sandbox::new();
    sandbox.fakes.host.route_interface = Some("ens5".to_string());

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    assert_eq!(report.uplink_interface, "ens5");
    assert!(sandbox.server_config().contains("-o ens5 -j MASQUERADE"));
}

#[test]
fn test_undetected_uplink_falls_back() {
    let mut sandbox = Sandbox::new();
    sandbox.fakes.host.route_interface = None;

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("bootstrap");

    assert_eq!(report.uplink_interface, "eth0");
    assert_eq!(report.client.endpoint.to_string(), "YOUR_SERVER_PUBLIC_IP:51820");
}

#[test]
fn test_existing_config_is_replaced_with_warning() {
    let sandbox = Sandbox::new();
    bootstrap(&sandbox.settings, &sandbox.caps()).expect("first bootstrap");
    let first = sandbox.server_config();

    let report = bootstrap(&sandbox.settings, &sandbox.caps()).expect("second bootstrap");

    assert!(report.replaced_existing);
    assert_ne!(sandbox.server_config(), first);
    assert_eq!(parse_wg_config(&sandbox.server_config()).expect("parse").peers.len(), 1);
}

// ============================================================================
// Test: Failures
// ============================================================================

#[test]
fn test_unprivileged_bootstrap_touches_nothing() {
    let mut sandbox = Sandbox::new();
    sandbox.fakes.host.privileged = false;

    let err = bootstrap(&sandbox.settings, &sandbox.caps()).expect_err("not privileged");

    assert!(matches!(err, ProvisionError::NotPrivileged));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(!sandbox.settings.config_dir.exists());
    assert!(sandbox.fakes.packages.installed().is_empty());
}

#[test]
fn test_server_at_254_has_no_room_for_first_client() {
    let mut sandbox = Sandbox::new();
    sandbox.settings.server_address = "10.0.0.254/24".parse().expect("network");

    let err = bootstrap(&sandbox.settings, &sandbox.caps()).expect_err("out of range");

    assert!(matches!(err, ProvisionError::AddressExhausted { octet: 255, .. }));
    assert!(!sandbox.settings.config_dir.exists());
}

#[test]
fn test_package_failure_aborts() {
    let mut sandbox = Sandbox::new();
    sandbox.fakes.packages = FakePackageManager::failing();

    let err = bootstrap(&sandbox.settings, &sandbox.caps()).expect_err("apt failure");

    assert_eq!(err.kind(), ErrorKind::System);
    assert!(!sandbox.settings.key_dir.exists());
    assert!(!sandbox.server_config_path().exists());
    assert!(fs::read_dir(sandbox.dir.path()).expect("read dir").next().is_none());
}
