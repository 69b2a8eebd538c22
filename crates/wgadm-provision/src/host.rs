//! Host inspection: privilege, routing, addresses and the invoking user.

use std::env;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use nix::unistd::{self, Gid, Uid, User};
use tracing::debug;

use crate::command::{AllowedProgram, SafeCommand};
use crate::error::{ProvisionError, Result};

/// The unprivileged user who invoked the tool through `sudo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokingUser {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    /// Home directory.
    pub home: PathBuf,
}

/// Read-only view of the host, plus ownership hand-over of artifacts.
pub trait HostProbe {
    /// Whether the process runs with administrative privilege.
    fn is_privileged(&self) -> bool;

    /// Name of the interface carrying the default IPv4 route.
    fn default_route_interface(&self) -> Option<String>;

    /// First IPv4 address configured on `interface`.
    fn interface_ipv4(&self, interface: &str) -> Option<Ipv4Addr>;

    /// The non-root user named by `SUDO_USER`, if any.
    fn invoking_user(&self) -> Option<InvokingUser>;

    /// Home directory of the current process.
    fn home_dir(&self) -> PathBuf;

    /// Gives `path` to `user`.
    fn hand_over(&self, path: &Path, user: &InvokingUser) -> Result<()>;

    /// The server's public IPv4: the first address on the default-route
    /// interface.
    fn public_ipv4(&self) -> Option<Ipv4Addr> {
        let interface = self.default_route_interface()?;
        self.interface_ipv4(&interface)
    }
}

/// [`HostProbe`] backed by the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostProbe for SystemHost {
    fn is_privileged(&self) -> bool {
        unistd::geteuid().is_root()
    }

    fn default_route_interface(&self) -> Option<String> {
        let output = SafeCommand::new(AllowedProgram::Ip)
            .args(["-4", "route", "show", "default"])
            .execute()
            .map_err(|e| debug!(error = %e, "default route lookup failed"))
            .ok()?;
        parse_default_route(&output.stdout_lossy())
    }

    fn interface_ipv4(&self, interface: &str) -> Option<Ipv4Addr> {
        let output = SafeCommand::new(AllowedProgram::Ip)
            .args(["-4", "-o", "addr", "show", "dev", interface])
            .execute()
            .map_err(|e| debug!(interface, error = %e, "address lookup failed"))
            .ok()?;
        parse_interface_ipv4(&output.stdout_lossy())
    }

    fn invoking_user(&self) -> Option<InvokingUser> {
        let name = env::var("SUDO_USER").ok().filter(|n| !n.is_empty() && n != "root")?;
        let user = User::from_name(&name)
            .map_err(|e| debug!(user = %name, error = %e, "user lookup failed"))
            .ok()??;
        Some(InvokingUser {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            home: user.dir,
        })
    }

    fn home_dir(&self) -> PathBuf {
        env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map_or_else(|| PathBuf::from("/root"), PathBuf::from)
    }

    fn hand_over(&self, path: &Path, user: &InvokingUser) -> Result<()> {
        unistd::chown(path, Some(Uid::from_raw(user.uid)), Some(Gid::from_raw(user.gid))).map_err(|errno| {
            ProvisionError::Ownership {
                path: path.to_path_buf(),
                user: user.name.clone(),
                reason: errno.desc().to_string(),
            }
        })
    }
}

/// Extracts the device from `ip -4 route show default` output.
///
/// The first `default` line wins.
#[must_use]
pub fn parse_default_route(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|t| *t == "dev")?;
            tokens.next().map(str::to_string)
        })
}

/// Extracts the first address from `ip -4 -o addr show dev <if>` output.
#[must_use]
pub fn parse_interface_ipv4(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| *t == "inet")?;
        let cidr = tokens.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}
