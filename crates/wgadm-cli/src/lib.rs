//! wgadm CLI library.
//!
//! Provides the `wgadm` command-line tool for standing up a single-host
//! WireGuard VPN server and enrolling clients against it.
//!
//! # Commands
//!
//! - `bootstrap` - Install packages, write the server config and the first client
//! - `add-client` - Allocate the next client address and write its artifacts
//! - `list-clients` - Show the peers in the server config

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::{OutputFormat, TableDisplay};
