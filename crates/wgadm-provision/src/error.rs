//! Error types for the provisioning procedures.

use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use wgadm_wireguard::WireGuardError;

use crate::command::CommandError;

/// Broad class of a failure, mirroring how an operator reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing privilege or missing server files. Nothing was changed.
    Precondition,
    /// The server configuration could not be understood.
    Parse,
    /// The address space is exhausted.
    ResourceLimit,
    /// I/O, locking or an external tool failed.
    System,
}

/// Errors raised by bootstrap and enrollment.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The caller lacks administrative privilege.
    #[error("this command must be run as root (try sudo)")]
    NotPrivileged,

    /// The server configuration file does not exist.
    #[error("server config not found at {}; run `wgadm bootstrap` first", .0.display())]
    MissingServerConfig(PathBuf),

    /// The server public key file does not exist.
    #[error("server public key not found at {}", .0.display())]
    MissingServerKey(PathBuf),

    /// The server configuration has no IPv4 `Address` line.
    #[error("no IPv4 Address line in [Interface] section of {}", .0.display())]
    MissingAddress(PathBuf),

    /// A server address is not a usable IPv4 address/prefix.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// No client address is left in the server subnet.
    #[error("address space exhausted: next client octet would be {octet} (max {max}) in {network}")]
    AddressExhausted {
        /// The octet the allocator would have needed.
        octet: u16,
        /// Highest octet the subnet allows for a client.
        max: u8,
        /// The server's address block.
        network: String,
    },

    /// A configuration file or key could not be parsed.
    #[error("{}: {source}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: WireGuardError,
    },

    /// A WireGuard value could not be built.
    #[error(transparent)]
    WireGuard(#[from] WireGuardError),

    /// Filesystem access failed.
    #[error("{}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The server config lock could not be taken.
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An external tool failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// File ownership could not be handed to the invoking user.
    #[error("failed to change ownership of {} to {user}: {reason}", .path.display())]
    Ownership {
        /// Path being changed.
        path: PathBuf,
        /// Target user name.
        user: String,
        /// Description of the failure.
        reason: String,
    },

    /// QR code rendering failed.
    #[error("failed to render QR code: {0}")]
    Qr(String),
}

impl ProvisionError {
    /// Wraps an I/O error with the path it concerns.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Address exhaustion error for a server network.
    #[must_use]
    pub fn exhausted(octet: u16, max: u8, network: impl ToString) -> Self {
        Self::AddressExhausted {
            octet,
            max,
            network: network.to_string(),
        }
    }

    /// Invalid address error for a host that cannot be used.
    #[must_use]
    pub fn invalid_address(addr: Ipv4Addr, reason: &str) -> Self {
        Self::InvalidAddress(format!("{addr}: {reason}"))
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotPrivileged | Self::MissingServerConfig(_) | Self::MissingServerKey(_) => {
                ErrorKind::Precondition
            }
            Self::MissingAddress(_) | Self::InvalidAddress(_) | Self::Parse { .. } | Self::WireGuard(_) => {
                ErrorKind::Parse
            }
            Self::AddressExhausted { .. } => ErrorKind::ResourceLimit,
            Self::Io { .. } | Self::Lock { .. } | Self::Command(_) | Self::Ownership { .. } | Self::Qr(_) => {
                ErrorKind::System
            }
        }
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message() {
        let err = ProvisionError::exhausted(255, 254, "10.0.0.1/24");
        assert_eq!(
            err.to_string(),
            "address space exhausted: next client octet would be 255 (max 254) in 10.0.0.1/24"
        );
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
    }

    #[test]
    fn precondition_kinds() {
        assert_eq!(ProvisionError::NotPrivileged.kind(), ErrorKind::Precondition);
        assert_eq!(
            ProvisionError::MissingServerConfig(PathBuf::from("/etc/wireguard/wg0.conf")).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            ProvisionError::MissingServerKey(PathBuf::from("/etc/wireguard/keys/server_public.key")).kind(),
            ErrorKind::Precondition
        );
    }

    #[test]
    fn missing_config_mentions_path() {
        let err = ProvisionError::MissingServerConfig(PathBuf::from("/etc/wireguard/wg0.conf"));
        assert!(err.to_string().contains("/etc/wireguard/wg0.conf"));
    }

    #[test]
    fn io_error_keeps_source() {
        let err = ProvisionError::io("/tmp/x", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.kind(), ErrorKind::System);
        assert!(std::error::Error::source(&err).is_some());
    }
}
