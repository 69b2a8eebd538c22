//! Capability implementations for a Debian-family host.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, info};
use wgadm_wireguard::KeyPair;

use crate::capabilities::{Firewall, Forwarding, KeyGenerator, PackageManager, ServiceManager};
use crate::command::{AllowedProgram, SafeCommand};
use crate::error::{ProvisionError, Result};

/// Kernel parameters that enable routing between the tunnel and the uplink.
pub const FORWARDING_LINES: &[&str] = &["net.ipv4.ip_forward=1", "net.ipv6.conf.all.forwarding=1"];

/// Generates keys in-process from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeyGenerator;

impl KeyGenerator for NativeKeyGenerator {
    fn generate(&self) -> KeyPair {
        KeyPair::generate()
    }
}

/// `apt-get`, run non-interactively.
#[derive(Debug, Clone, Copy, Default)]
pub struct AptGet;

impl PackageManager for AptGet {
    fn install(&self, packages: &[&str]) -> Result<()> {
        info!(packages = ?packages, "installing packages");
        SafeCommand::new(AllowedProgram::AptGet)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .args(["update", "-q"])
            .execute()?;
        SafeCommand::new(AllowedProgram::AptGet)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .args(["install", "-y", "-q"])
            .args(packages)
            .execute()?;
        Ok(())
    }
}

/// `ufw`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ufw;

impl Ufw {
    fn run(args: &[&str]) -> Result<String> {
        let output = SafeCommand::new(AllowedProgram::Ufw).args(args).execute()?;
        Ok(output.stdout_lossy())
    }
}

impl Firewall for Ufw {
    fn configure(&self, listen_port: u16) -> Result<bool> {
        let port_rule = format!("{listen_port}/udp");
        Self::run(&["default", "deny", "incoming"])?;
        Self::run(&["default", "allow", "outgoing"])?;
        Self::run(&["allow", port_rule.as_str()])?;
        Self::run(&["allow", "ssh"])?;

        let status = Self::run(&["status"])?;
        if is_ufw_active(&status) {
            debug!("firewall already active");
            return Ok(false);
        }
        Self::run(&["--force", "enable"])?;
        info!(port = %port_rule, "firewall enabled");
        Ok(true)
    }
}

/// Whether `ufw status` output reports an active firewall.
#[must_use]
pub fn is_ufw_active(status: &str) -> bool {
    status
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("status: active"))
}

/// Persists forwarding in a sysctl file and reloads it with `sysctl -p`.
#[derive(Debug, Clone)]
pub struct SysctlForwarding {
    path: PathBuf,
}

impl SysctlForwarding {
    /// Uses the sysctl file at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Forwarding for SysctlForwarding {
    fn enable(&self) -> Result<Vec<String>> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ProvisionError::io(&self.path, e)),
        };

        let missing = missing_forwarding_lines(&existing);
        if !missing.is_empty() {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| ProvisionError::io(&self.path, e))?;
            let mut block = String::new();
            if !existing.is_empty() && !existing.ends_with('\n') {
                block.push('\n');
            }
            for line in &missing {
                block.push_str(line);
                block.push('\n');
            }
            file.write_all(block.as_bytes())
                .map_err(|e| ProvisionError::io(&self.path, e))?;
            info!(path = %self.path.display(), lines = ?missing, "persisted forwarding");
        }

        SafeCommand::new(AllowedProgram::Sysctl)
            .arg("-p")
            .arg(self.path.to_string_lossy())
            .execute()?;

        Ok(missing.into_iter().map(str::to_string).collect())
    }
}

/// Forwarding lines absent from a sysctl file. Whitespace around `=` is
/// tolerated and commented lines do not count.
#[must_use]
pub fn missing_forwarding_lines(contents: &str) -> Vec<&'static str> {
    let present: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .map(|line| line.split_whitespace().collect())
        .collect();

    FORWARDING_LINES
        .iter()
        .copied()
        .filter(|wanted| !present.iter().any(|line| line.as_str() == *wanted))
        .collect()
}

/// `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl ServiceManager for Systemctl {
    fn enable(&self, unit: &str) -> Result<()> {
        SafeCommand::new(AllowedProgram::Systemctl).args(["enable", unit]).execute()?;
        Ok(())
    }

    fn is_active(&self, unit: &str) -> Result<bool> {
        let output = SafeCommand::new(AllowedProgram::Systemctl)
            .args(["is-active", "--quiet", unit])
            .execute_unchecked()?;
        Ok(output.success())
    }

    fn start(&self, unit: &str) -> Result<()> {
        SafeCommand::new(AllowedProgram::Systemctl).args(["start", unit]).execute()?;
        Ok(())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        SafeCommand::new(AllowedProgram::Systemctl).args(["restart", unit]).execute()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", &["net.ipv4.ip_forward=1", "net.ipv6.conf.all.forwarding=1"] ; "empty file")]
    #[test_case("net.ipv4.ip_forward=1\n", &["net.ipv6.conf.all.forwarding=1"] ; "ipv4 only")]
    #[test_case("net.ipv4.ip_forward = 1\nnet.ipv6.conf.all.forwarding = 1\n", &[] ; "spaced")]
    #[test_case("#net.ipv4.ip_forward=1\n", &["net.ipv4.ip_forward=1", "net.ipv6.conf.all.forwarding=1"] ; "commented")]
    #[test_case("net.ipv4.ip_forward=0\n", &["net.ipv4.ip_forward=1", "net.ipv6.conf.all.forwarding=1"] ; "disabled")]
    fn forwarding_lines(contents: &str, expected: &[&str]) {
        assert_eq!(missing_forwarding_lines(contents), expected);
    }

    #[test_case("Status: active\n\nTo Action From\n", true ; "active")]
    #[test_case("Status: inactive\n", false ; "inactive")]
    #[test_case("", false ; "empty")]
    fn ufw_status(status: &str, expected: bool) {
        assert_eq!(is_ufw_active(status), expected);
    }

    #[test]
    fn native_generator_produces_distinct_keys() {
        let a = NativeKeyGenerator.generate();
        let b = NativeKeyGenerator.generate();
        assert_ne!(a.public_key(), b.public_key());
    }
}
