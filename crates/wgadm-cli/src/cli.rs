//! Command-line argument parsing with clap.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use wgadm_provision::{AllocationStrategy, ServerNetwork, Settings};

/// wgadm - WireGuard server bootstrap and client enrollment.
#[derive(Parser, Debug, Clone)]
#[command(name = "wgadm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Directory holding the server config.
    #[arg(long, env = "WGADM_CONFIG_DIR", default_value = "/etc/wireguard", global = true)]
    pub config_dir: PathBuf,

    /// WireGuard interface name.
    #[arg(short, long, env = "WGADM_INTERFACE", default_value = "wg0", global = true)]
    pub interface: String,

    /// Directory holding key files.
    #[arg(long, env = "WGADM_KEY_DIR", default_value = "/etc/wireguard/keys", global = true)]
    pub key_dir: PathBuf,

    /// Root directory for client artifacts.
    ///
    /// Defaults to `wireguard-clients` in the home of the user running sudo.
    #[arg(long, env = "WGADM_CLIENT_DIR", global = true)]
    pub client_dir: Option<PathBuf>,

    /// Server VPN address and prefix written at bootstrap.
    #[arg(long, env = "WGADM_SERVER_ADDRESS", default_value = "10.0.0.1/24", global = true)]
    pub server_address: ServerNetwork,

    /// UDP port the server listens on.
    #[arg(short, long, env = "WGADM_LISTEN_PORT", default_value_t = 51820, global = true)]
    pub listen_port: u16,

    /// DNS servers pushed to clients (comma-separated).
    #[arg(
        long,
        env = "WGADM_DNS",
        value_delimiter = ',',
        default_value = "1.1.1.1,8.8.8.8",
        global = true
    )]
    pub dns: Vec<IpAddr>,

    /// How new client addresses are picked.
    #[arg(short, long, env = "WGADM_ALLOCATION", value_enum, default_value_t = AllocationArg::LowestFree, global = true)]
    pub allocation: AllocationArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings for the provisioning procedures.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut settings = Settings {
            config_dir: self.config_dir.clone(),
            interface: self.interface.clone(),
            key_dir: self.key_dir.clone(),
            client_dir: self.client_dir.clone(),
            server_address: self.server_address,
            listen_port: self.listen_port,
            dns: self.dns.clone(),
            allocation: self.allocation.into(),
            ..Settings::default()
        };
        if let Commands::Bootstrap { skip_packages: true } = self.command {
            settings.install_packages = false;
        }
        settings
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Client address allocation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AllocationArg {
    /// Smallest unused address above the server's.
    #[default]
    LowestFree,
    /// Server octet plus peer count plus one.
    Sequential,
}

impl From<AllocationArg> for AllocationStrategy {
    fn from(arg: AllocationArg) -> Self {
        match arg {
            AllocationArg::LowestFree => Self::LowestFree,
            AllocationArg::Sequential => Self::Sequential,
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Install WireGuard, write the server config and the first client.
    ///
    /// Replaces any existing server config for the interface.
    Bootstrap {
        /// Do not install packages.
        #[arg(long)]
        skip_packages: bool,
    },

    /// Enroll one new client against the bootstrapped server.
    AddClient,

    /// List the peers in the server config.
    ListClients,
}
