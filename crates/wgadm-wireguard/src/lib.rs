//! WireGuard building blocks for wgadm.
//!
//! This crate provides the Curve25519 key types, address and endpoint types,
//! and the `wg-quick` configuration file model used by the provisioning
//! procedures.

pub mod config;
pub mod error;
mod keys;
mod types;

pub use config::{
    generate_peer_section, generate_wg_config, parse_wg_config, InterfaceConfig,
    InterfaceConfigBuilder, PeerConfig, PeerConfigBuilder,
};
pub use error::{Result, WireGuardError};
pub use keys::{KeyPair, PrivateKey, PublicKey, KEY_BASE64_LEN, KEY_SIZE};
pub use types::{AllowedIp, Endpoint, EndpointHost};
