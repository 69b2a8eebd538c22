//! Recording capability fakes for tests.
//!
//! Each fake is cheap to clone and shares its state between clones, so a
//! test keeps one handle for assertions and boxes another into
//! [`Capabilities`].

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use wgadm_wireguard::{KeyPair, PublicKey};

use crate::capabilities::{Capabilities, Firewall, Forwarding, KeyGenerator, PackageManager, ServiceManager};
use crate::command::CommandError;
use crate::error::Result;
use crate::host::{HostProbe, InvokingUser};
use crate::qr::{QrRenderer, RenderedQr};
use crate::system::FORWARDING_LINES;

fn failure(command: &str) -> crate::error::ProvisionError {
    CommandError::NonZeroExit {
        command: command.to_string(),
        exit_code: 1,
        stderr: "simulated failure".to_string(),
    }
    .into()
}

/// Generates real keys and remembers their public halves.
#[derive(Debug, Clone, Default)]
pub struct FakeKeyGenerator {
    generated: Arc<Mutex<Vec<PublicKey>>>,
}

impl FakeKeyGenerator {
    /// Public keys handed out so far, in order.
    #[must_use]
    pub fn generated(&self) -> Vec<PublicKey> {
        self.generated.lock().clone()
    }
}

impl KeyGenerator for FakeKeyGenerator {
    fn generate(&self) -> KeyPair {
        let pair = KeyPair::generate();
        self.generated.lock().push(*pair.public_key());
        pair
    }
}

/// Returns a tiny placeholder SVG and records the payload.
#[derive(Debug, Clone, Default)]
pub struct FakeQrRenderer {
    rendered: Arc<Mutex<Vec<String>>>,
}

impl FakeQrRenderer {
    /// Payloads rendered so far.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }
}

impl QrRenderer for FakeQrRenderer {
    fn render(&self, data: &str) -> Result<RenderedQr> {
        self.rendered.lock().push(data.to_string());
        Ok(RenderedQr {
            svg: format!("<svg data-bytes=\"{}\"/>\n", data.len()),
            terminal: "[qr]".to_string(),
        })
    }
}

/// Records package installs; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakePackageManager {
    installed: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl FakePackageManager {
    /// A package manager whose installs always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Packages installed so far.
    #[must_use]
    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().clone()
    }
}

impl PackageManager for FakePackageManager {
    fn install(&self, packages: &[&str]) -> Result<()> {
        if self.fail {
            return Err(failure("apt-get install"));
        }
        self.installed.lock().extend(packages.iter().map(|p| (*p).to_string()));
        Ok(())
    }
}

/// Records the ports opened and tracks whether the firewall is on.
#[derive(Debug, Clone, Default)]
pub struct FakeFirewall {
    state: Arc<Mutex<FirewallState>>,
}

#[derive(Debug, Default)]
struct FirewallState {
    active: bool,
    ports: Vec<u16>,
}

impl FakeFirewall {
    /// Ports opened so far.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        self.state.lock().ports.clone()
    }

    /// Whether the firewall is enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }
}

impl Firewall for FakeFirewall {
    fn configure(&self, listen_port: u16) -> Result<bool> {
        let mut state = self.state.lock();
        state.ports.push(listen_port);
        let enabled_now = !state.active;
        state.active = true;
        Ok(enabled_now)
    }
}

/// Records forwarding requests. The first call reports every line as added.
#[derive(Debug, Clone, Default)]
pub struct FakeForwarding {
    calls: Arc<Mutex<usize>>,
}

impl FakeForwarding {
    /// Number of times forwarding was enabled.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl Forwarding for FakeForwarding {
    fn enable(&self) -> Result<Vec<String>> {
        let mut calls = self.calls.lock();
        *calls += 1;
        if *calls == 1 {
            Ok(FORWARDING_LINES.iter().map(|l| (*l).to_string()).collect())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Records service actions as `"<verb> <unit>"` strings.
#[derive(Debug, Clone, Default)]
pub struct FakeServiceManager {
    state: Arc<Mutex<ServiceState>>,
}

#[derive(Debug, Default)]
struct ServiceState {
    active: bool,
    actions: Vec<String>,
}

impl FakeServiceManager {
    /// A manager whose units are already running.
    #[must_use]
    pub fn running() -> Self {
        let fake = Self::default();
        fake.state.lock().active = true;
        fake
    }

    /// Actions performed so far.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    fn record(&self, verb: &str, unit: &str) {
        self.state.lock().actions.push(format!("{verb} {unit}"));
    }
}

impl ServiceManager for FakeServiceManager {
    fn enable(&self, unit: &str) -> Result<()> {
        self.record("enable", unit);
        Ok(())
    }

    fn is_active(&self, _unit: &str) -> Result<bool> {
        Ok(self.state.lock().active)
    }

    fn start(&self, unit: &str) -> Result<()> {
        self.record("start", unit);
        self.state.lock().active = true;
        Ok(())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.record("restart", unit);
        Ok(())
    }
}

/// A scripted host.
#[derive(Debug, Clone)]
pub struct FakeHost {
    /// Whether the process is privileged.
    pub privileged: bool,
    /// Default-route interface, `None` to simulate detection failure.
    pub route_interface: Option<String>,
    /// Address of the default-route interface.
    pub public_ip: Option<Ipv4Addr>,
    /// `SUDO_USER`.
    pub user: Option<InvokingUser>,
    /// Home of the current process.
    pub home: PathBuf,
    handed_over: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeHost {
    /// A privileged host with `eth0` at `203.0.113.10` and no `SUDO_USER`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            privileged: true,
            route_interface: Some("eth0".to_string()),
            public_ip: Some(Ipv4Addr::new(203, 0, 113, 10)),
            user: None,
            home: home.into(),
            handed_over: Arc::default(),
        }
    }

    /// Paths whose ownership was handed to the invoking user.
    #[must_use]
    pub fn handed_over(&self) -> Vec<PathBuf> {
        self.handed_over.lock().clone()
    }
}

impl HostProbe for FakeHost {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn default_route_interface(&self) -> Option<String> {
        self.route_interface.clone()
    }

    fn interface_ipv4(&self, interface: &str) -> Option<Ipv4Addr> {
        (self.route_interface.as_deref() == Some(interface))
            .then_some(self.public_ip)
            .flatten()
    }

    fn invoking_user(&self) -> Option<InvokingUser> {
        self.user.clone()
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }

    fn hand_over(&self, path: &Path, _user: &InvokingUser) -> Result<()> {
        self.handed_over.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// One handle on every fake, for building [`Capabilities`] and asserting on
/// what happened.
#[derive(Debug, Clone)]
pub struct FakeSystem {
    /// Key generator.
    pub keys: FakeKeyGenerator,
    /// QR renderer.
    pub qr: FakeQrRenderer,
    /// Package manager.
    pub packages: FakePackageManager,
    /// Firewall.
    pub firewall: FakeFirewall,
    /// Forwarding.
    pub forwarding: FakeForwarding,
    /// Service manager.
    pub service: FakeServiceManager,
    /// Host.
    pub host: FakeHost,
}

impl FakeSystem {
    /// Fakes for a privileged, healthy host whose home is `home`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            keys: FakeKeyGenerator::default(),
            qr: FakeQrRenderer::default(),
            packages: FakePackageManager::default(),
            firewall: FakeFirewall::default(),
            forwarding: FakeForwarding::default(),
            service: FakeServiceManager::default(),
            host: FakeHost::new(home),
        }
    }

    /// Capabilities sharing state with this handle.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            keys: Box::new(self.keys.clone()),
            qr: Box::new(self.qr.clone()),
            packages: Box::new(self.packages.clone()),
            firewall: Box::new(self.firewall.clone()),
            forwarding: Box::new(self.forwarding.clone()),
            service: Box::new(self.service.clone()),
            host: Box::new(self.host.clone()),
        }
    }
}
