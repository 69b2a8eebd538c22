//! External collaborators of the procedures.
//!
//! Everything that reaches outside the process, apart from reading and
//! writing the files the procedures own, sits behind one of these traits.
//! [`Capabilities::system`] wires the real implementations; the
//! [`fake`](crate::fake) module provides recording stand-ins for tests.

use std::fmt;

use wgadm_wireguard::KeyPair;

use crate::error::Result;
use crate::host::{HostProbe, SystemHost};
use crate::qr::{QrCodeRenderer, QrRenderer};
use crate::settings::Settings;
use crate::system::{AptGet, NativeKeyGenerator, SysctlForwarding, Systemctl, Ufw};

/// Produces fresh Curve25519 key pairs.
pub trait KeyGenerator {
    /// Generates a key pair.
    fn generate(&self) -> KeyPair;
}

/// Installs distribution packages.
pub trait PackageManager {
    /// Installs `packages`, refreshing the package index first.
    fn install(&self, packages: &[&str]) -> Result<()>;
}

/// Host firewall.
pub trait Firewall {
    /// Denies inbound and allows outbound traffic by default, opens
    /// `listen_port`/udp and SSH, and enables the firewall if inactive.
    ///
    /// Returns `true` when the firewall had to be enabled.
    fn configure(&self, listen_port: u16) -> Result<bool>;
}

/// Kernel IP forwarding.
pub trait Forwarding {
    /// Persists IPv4 and IPv6 forwarding and reloads kernel parameters.
    ///
    /// Returns the lines that had to be added.
    fn enable(&self) -> Result<Vec<String>>;
}

/// What was done to bring a service up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    /// The unit was running and got restarted.
    Restarted,
    /// The unit was stopped and got started.
    Started,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restarted => f.write_str("restarted"),
            Self::Started => f.write_str("started"),
        }
    }
}

/// Service supervisor.
pub trait ServiceManager {
    /// Enables `unit` at boot.
    fn enable(&self, unit: &str) -> Result<()>;

    /// Whether `unit` is currently running.
    fn is_active(&self, unit: &str) -> Result<bool>;

    /// Starts `unit`.
    fn start(&self, unit: &str) -> Result<()>;

    /// Restarts `unit`.
    fn restart(&self, unit: &str) -> Result<()>;

    /// Restarts `unit` if it is running, starts it otherwise.
    fn restart_or_start(&self, unit: &str) -> Result<ServiceAction> {
        if self.is_active(unit)? {
            self.restart(unit)?;
            Ok(ServiceAction::Restarted)
        } else {
            self.start(unit)?;
            Ok(ServiceAction::Started)
        }
    }
}

/// The full set of collaborators a procedure runs against.
pub struct Capabilities {
    /// Key pair source.
    pub keys: Box<dyn KeyGenerator>,
    /// QR rendering.
    pub qr: Box<dyn QrRenderer>,
    /// Package installation.
    pub packages: Box<dyn PackageManager>,
    /// Firewall configuration.
    pub firewall: Box<dyn Firewall>,
    /// IP forwarding.
    pub forwarding: Box<dyn Forwarding>,
    /// Service control.
    pub service: Box<dyn ServiceManager>,
    /// Host inspection.
    pub host: Box<dyn HostProbe>,
}

impl Capabilities {
    /// Real implementations talking to the running system.
    #[must_use]
    pub fn system(settings: &Settings) -> Self {
        Self {
            keys: Box::new(NativeKeyGenerator),
            qr: Box::new(QrCodeRenderer),
            packages: Box::new(AptGet),
            firewall: Box::new(Ufw),
            forwarding: Box::new(SysctlForwarding::new(settings.sysctl_path.clone())),
            service: Box::new(Systemctl),
            host: Box::new(SystemHost),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
