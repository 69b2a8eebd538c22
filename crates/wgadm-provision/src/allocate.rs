//! Client identity and address allocation.
//!
//! Two strategies are available:
//!
//! - [`AllocationStrategy::Sequential`] assumes every enrolled peer took the
//!   next address after the server's. With `P` peers and server octet `S`, the
//!   new client gets octet `S + P + 1`. Addresses are never checked for use.
//! - [`AllocationStrategy::LowestFree`] collects every IPv4 address already
//!   routed to a peer and picks the lowest free host above the server's own
//!   address, skipping the subnet's network and broadcast addresses. It
//!   survives hand-edited configs and removed peers.
//!
//! On a config built only by sequential enrollment the two agree.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use wgadm_wireguard::InterfaceConfig;

use crate::error::{ProvisionError, Result};
use crate::network::{ServerNetwork, MAX_HOST_OCTET};

/// How the next client address is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    /// Count-based: octet = server octet + peer count + 1.
    Sequential,
    /// Scan existing `AllowedIPs` and pick the lowest unused host.
    #[default]
    LowestFree,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::LowestFree => f.write_str("lowest-free"),
        }
    }
}

/// A freshly allocated client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Client number, the `N` in `client<N>`.
    pub index: usize,
    /// The client's VPN address.
    pub address: Ipv4Addr,
}

impl Allocation {
    /// The client name, `client<N>`.
    #[must_use]
    pub fn name(&self) -> String {
        client_name(self.index)
    }
}

/// Name of the `n`-th client.
#[must_use]
pub fn client_name(index: usize) -> String {
    format!("client{index}")
}

/// Picks the next client identity for a server configuration.
///
/// `name_taken` reports whether a client name already has artifacts on disk;
/// it is only consulted by [`AllocationStrategy::LowestFree`], which then
/// moves on to the next free number. The sequential strategy always names
/// the client `client<P+1>`.
///
/// # Errors
///
/// Returns [`ProvisionError::AddressExhausted`] when no address between the
/// server's octet and `.254` (or the subnet's last host) is available.
pub fn allocate(
    network: &ServerNetwork,
    config: &InterfaceConfig,
    strategy: AllocationStrategy,
    name_taken: impl Fn(&str) -> bool,
) -> Result<Allocation> {
    let peer_count = config.peers.len();
    let mut index = peer_count + 1;

    let address = match strategy {
        AllocationStrategy::Sequential => sequential_address(network, peer_count)?,
        AllocationStrategy::LowestFree => {
            while name_taken(&client_name(index)) {
                index += 1;
            }
            lowest_free_address(network, config.peer_ipv4_addresses())?
        }
    };

    Ok(Allocation { index, address })
}

/// The count-based address: last octet = server octet + `peer_count` + 1.
///
/// # Errors
///
/// Fails when the octet would exceed 254; the value is never wrapped.
pub fn sequential_address(network: &ServerNetwork, peer_count: usize) -> Result<Ipv4Addr> {
    let octet = usize::from(network.last_octet()) + peer_count + 1;
    if octet > usize::from(MAX_HOST_OCTET) {
        let reported = u16::try_from(octet).unwrap_or(u16::MAX);
        return Err(ProvisionError::exhausted(reported, MAX_HOST_OCTET, network));
    }
    Ok(network.host_with_octet(octet as u8))
}

/// The lowest host above the server's own address that is free.
///
/// Candidates run from the server's octet plus one up to
/// [`ServerNetwork::highest_client_octet`]; the subnet's network and
/// broadcast addresses are never handed out.
///
/// # Errors
///
/// Fails when every candidate is taken, reporting the first octet past the
/// subnet's upper bound.
pub fn lowest_free_address(
    network: &ServerNetwork,
    used: impl IntoIterator<Item = Ipv4Addr>,
) -> Result<Ipv4Addr> {
    let taken: HashSet<Ipv4Addr> = used.into_iter().collect();
    let first = network.last_octet().saturating_add(1);
    let last = network.highest_client_octet();

    (first..=last)
        .map(|octet| network.host_with_octet(octet))
        .filter(|candidate| network.is_client_host(*candidate))
        .find(|candidate| !taken.contains(candidate))
        .ok_or_else(|| {
            let needed = u16::from(last.max(network.last_octet())) + 1;
            ProvisionError::exhausted(needed, last, network)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use wgadm_wireguard::{AllowedIp, KeyPair, PeerConfig, PrivateKey};

    fn network(s: &str) -> ServerNetwork {
        s.parse().expect("valid network")
    }

    fn config_with_peers(octets: &[u8]) -> InterfaceConfig {
        let mut config = InterfaceConfig::new(PrivateKey::generate());
        for octet in octets {
            let mut peer = PeerConfig::new(*KeyPair::generate().public_key());
            peer.allowed_ips
                .push(AllowedIp::host_v4(Ipv4Addr::new(10, 0, 0, *octet)));
            config.peers.push(peer);
        }
        config
    }

    fn never_taken(_: &str) -> bool {
        false
    }

    #[test]
    fn sequential_second_client() {
        let config = config_with_peers(&[2]);
        let allocation = allocate(&network("10.0.0.1/24"), &config, AllocationStrategy::Sequential, never_taken)
            .expect("in range");
        assert_eq!(allocation.name(), "client2");
        assert_eq!(allocation.address, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test_case(0, 2 ; "no peers")]
    #[test_case(1, 3 ; "one peer")]
    #[test_case(10, 12 ; "ten peers")]
    #[test_case(252, 254 ; "last address")]
    fn sequential_octet(peers: usize, expected: u8) {
        let address = sequential_address(&network("10.0.0.1/24"), peers).expect("in range");
        assert_eq!(address, Ipv4Addr::new(10, 0, 0, expected));
    }

    #[test]
    fn sequential_rejects_octet_255() {
        let err = sequential_address(&network("10.0.0.1/24"), 253).expect_err("out of range");
        assert!(matches!(err, ProvisionError::AddressExhausted { octet: 255, .. }));
    }

    #[test]
    fn sequential_ignores_actual_addresses() {
        // Peers at .2 and .9: the count-based scheme still hands out .4.
        let config = config_with_peers(&[2, 9]);
        let allocation = allocate(&network("10.0.0.1/24"), &config, AllocationStrategy::Sequential, |_| true)
            .expect("in range");
        assert_eq!(allocation.address, Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(allocation.index, 3);
    }

    #[test]
    fn lowest_free_reuses_gap() {
        // client2 (.3) was removed by hand.
        let config = config_with_peers(&[2, 4, 5]);
        let allocation = allocate(&network("10.0.0.1/24"), &config, AllocationStrategy::LowestFree, never_taken)
            .expect("free address");
        assert_eq!(allocation.address, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(allocation.name(), "client4");
    }

    #[test]
    fn lowest_free_skips_taken_names() {
        let config = config_with_peers(&[2]);
        let allocation = allocate(&network("10.0.0.1/24"), &config, AllocationStrategy::LowestFree, |name| {
            name == "client2" || name == "client3"
        })
        .expect("free address");
        assert_eq!(allocation.name(), "client4");
    }

    #[test_case("10.0.0.1/24", &[], 2 ; "default server")]
    #[test_case("10.0.0.5/24", &[], 6 ; "hosts below the server stay unused")]
    #[test_case("10.0.0.10/24", &[11], 12 ; "server octet above one")]
    #[test_case("10.0.0.17/28", &[], 18 ; "slash 28")]
    #[test_case("10.0.0.17/28", &[18, 19, 20], 21 ; "slash 28 with peers")]
    fn lowest_free_starts_above_server(server: &str, used: &[u8], expected: u8) {
        let net = network(server);
        let used = used.iter().map(|octet| net.host_with_octet(*octet));
        let address = lowest_free_address(&net, used).expect("free address");
        assert_eq!(address, Ipv4Addr::new(10, 0, 0, expected));
    }

    #[test]
    fn lowest_free_never_returns_network_address() {
        // .16 is the network address of 10.0.0.16/28 and lies below .17.
        let net = network("10.0.0.17/28");
        let address = lowest_free_address(&net, []).expect("free address");
        assert_ne!(address, net.subnet_base().network());
        assert_eq!(address, Ipv4Addr::new(10, 0, 0, 18));
    }

    #[test]
    fn lowest_free_never_returns_broadcast() {
        // 10.0.0.0/30 has hosts .1 and .2; .3 is the broadcast address.
        let net = network("10.0.0.1/30");
        assert_eq!(lowest_free_address(&net, []).expect("free"), Ipv4Addr::new(10, 0, 0, 2));
        let err = lowest_free_address(&net, [Ipv4Addr::new(10, 0, 0, 2)]).expect_err("full");
        assert!(matches!(err, ProvisionError::AddressExhausted { octet: 3, max: 2, .. }));
    }

    #[test]
    fn lowest_free_slash_28_reports_subnet_bound() {
        let net = network("10.0.0.17/28");
        let used = (18..=30).map(|octet| net.host_with_octet(octet));
        let err = lowest_free_address(&net, used).expect_err("full");
        assert!(matches!(err, ProvisionError::AddressExhausted { octet: 31, max: 30, .. }));
        assert!(err.to_string().contains("(max 30)"));
    }

    #[test]
    fn lowest_free_full_subnet_is_exhausted() {
        let octets: Vec<u8> = (2..=254).collect();
        let config = config_with_peers(&octets);
        let err = allocate(&network("10.0.0.1/24"), &config, AllocationStrategy::LowestFree, never_taken)
            .expect_err("exhausted");
        assert!(matches!(err, ProvisionError::AddressExhausted { .. }));
    }

    #[test]
    fn strategy_display_matches_serde() {
        assert_eq!(AllocationStrategy::LowestFree.to_string(), "lowest-free");
        let json = serde_json::to_string(&AllocationStrategy::Sequential).expect("serialize");
        assert_eq!(json, "\"sequential\"");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn strategies_agree_on_sequential_configs(server in 1u8..=200, peers in 0usize..40) {
                let net = network(&format!("10.0.0.{server}/24"));
                let used: Vec<Ipv4Addr> = (0..peers)
                    .filter_map(|i| u8::try_from(usize::from(server) + 1 + i).ok())
                    .filter(|octet| *octet <= MAX_HOST_OCTET)
                    .map(|octet| net.host_with_octet(octet))
                    .collect();
                prop_assume!(used.len() == peers);

                let sequential = sequential_address(&net, peers);
                let scanned = lowest_free_address(&net, used.iter().copied());
                match sequential {
                    Ok(address) => {
                        prop_assert_eq!(usize::from(address.octets()[3]), usize::from(server) + peers + 1);
                        prop_assert!(!used.contains(&address));
                        prop_assert_eq!(scanned.ok(), Some(address));
                    }
                    Err(_) => {
                        prop_assert!(usize::from(server) + peers + 1 > 254);
                        prop_assert!(scanned.is_err());
                    }
                }
            }

            #[test]
            fn lowest_free_is_a_client_host(
                server in 0u8..=254,
                prefix in 24u8..=30,
                used in proptest::collection::vec(0u8..=255, 0..16),
            ) {
                let net = network(&format!("10.0.0.{server}/{prefix}"));
                let used: Vec<Ipv4Addr> = used.into_iter().map(|octet| net.host_with_octet(octet)).collect();
                if let Ok(address) = lowest_free_address(&net, used.iter().copied()) {
                    prop_assert!(net.is_client_host(address));
                    prop_assert!(address.octets()[3] > server);
                    prop_assert!(!used.contains(&address));
                }
            }

            #[test]
            fn sequential_is_server_plus_count_plus_one(server in 1u8..=254, peers in 0usize..300) {
                let net = network(&format!("172.16.9.{server}/24"));
                let expected = usize::from(server) + peers + 1;
                match sequential_address(&net, peers) {
                    Ok(address) => prop_assert_eq!(usize::from(address.octets()[3]), expected),
                    Err(err) => {
                        prop_assert!(expected > 254);
                        let exhausted = matches!(err, ProvisionError::AddressExhausted { .. });
                        prop_assert!(exhausted);
                    }
                }
            }
        }
    }
}
