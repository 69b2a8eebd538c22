//! Server bootstrap and client enrollment for a single-host WireGuard VPN.
//!
//! The two procedures, [`bootstrap()`] and [`enroll()`], run against a
//! [`Settings`] value and a [`Capabilities`] bundle. Capabilities wrap every
//! external tool (package manager, firewall, service manager, QR renderer,
//! host inspection) so the procedures can be driven with the recording fakes
//! in [`fake`].
//!
//! ```rust,no_run
//! use wgadm_provision::{enroll, Capabilities, Settings};
//!
//! # fn example() -> wgadm_provision::Result<()> {
//! let settings = Settings::default();
//! let report = enroll(&settings, &Capabilities::system(&settings))?;
//! println!("{} -> {}", report.client.name, report.client.address);
//! # Ok(())
//! # }
//! ```

pub mod allocate;
pub mod artifacts;
pub mod bootstrap;
pub mod capabilities;
pub mod command;
pub mod enroll;
pub mod error;
pub mod fake;
pub mod host;
pub mod keystore;
pub mod network;
pub mod qr;
pub mod settings;
pub mod store;
pub mod system;

pub use allocate::{allocate, client_name, Allocation, AllocationStrategy};
pub use artifacts::{ClientArtifacts, EnrolledClient};
pub use bootstrap::{bootstrap, BootstrapReport};
pub use capabilities::{
    Capabilities, Firewall, Forwarding, KeyGenerator, PackageManager, ServiceAction, ServiceManager,
};
pub use enroll::{enroll, list_clients, ClientEntry, EnrollmentReport};
pub use error::{ErrorKind, ProvisionError, Result};
pub use host::{HostProbe, InvokingUser, SystemHost};
pub use network::ServerNetwork;
pub use qr::{QrCodeRenderer, QrRenderer, RenderedQr};
pub use settings::Settings;
