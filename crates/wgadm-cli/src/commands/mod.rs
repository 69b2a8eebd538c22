//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`bootstrap`] - Server bootstrap with the first client
//! - [`enroll`] - Client enrollment
//! - [`list`] - Peer listing

pub mod bootstrap;
pub mod enroll;
pub mod list;

pub use bootstrap::BootstrapCommand;
pub use enroll::EnrollCommand;
pub use list::ListCommand;
