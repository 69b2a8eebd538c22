//! The server configuration file.
//!
//! Enrollment is a read-modify-write of `<interface>.conf`. Callers take a
//! [`ConfigLock`] first; the lock lives on a sibling `<interface>.conf.lock`
//! file so the config itself can be replaced by rename while it is held.
//!
//! Every write goes to a temporary file in the same directory, which is then
//! renamed over the target. Readers never see a half-written config.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use wgadm_wireguard::{parse_wg_config, InterfaceConfig};

use crate::error::{ProvisionError, Result};
use crate::network::ServerNetwork;

/// Mode of the server configuration file.
pub const SERVER_CONFIG_MODE: u32 = 0o600;

/// An exclusive advisory lock on the server configuration.
///
/// Released when dropped.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release config lock");
        } else {
            debug!(path = %self.path.display(), "released config lock");
        }
    }
}

/// A parsed server configuration together with the text it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File contents exactly as read.
    pub raw: String,
    /// Parsed representation.
    pub config: InterfaceConfig,
    /// The server's first IPv4 `Address`.
    pub network: ServerNetwork,
}

impl LoadedConfig {
    /// Number of `[Peer]` sections.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.config.peers.len()
    }
}

/// Access to `<config-dir>/<interface>.conf`.
#[derive(Debug, Clone)]
pub struct ServerConfigStore {
    path: PathBuf,
}

impl ServerConfigStore {
    /// Creates a store for the config at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sibling lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Whether the configuration file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Blocks until the exclusive lock is held.
    ///
    /// The empty `<conf>.lock` file is created on first use and never
    /// removed, so it remains after a failed enrollment. Only the lock
    /// itself is released when the guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Lock`] if the lock file cannot be opened or
    /// locked.
    pub fn lock(&self) -> Result<ConfigLock> {
        let path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(SERVER_CONFIG_MODE)
            .open(&path)
            .map_err(|source| ProvisionError::Lock { path: path.clone(), source })?;

        FileExt::lock_exclusive(&file).map_err(|source| ProvisionError::Lock { path: path.clone(), source })?;
        debug!(path = %path.display(), "acquired config lock");

        Ok(ConfigLock { file, path })
    }

    /// Reads and parses the configuration.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::MissingServerConfig`] if the file does not exist
    /// - [`ProvisionError::Parse`] if it is not a valid WireGuard config
    /// - [`ProvisionError::MissingAddress`] if `[Interface]` has no IPv4 `Address`
    pub fn load(&self) -> Result<LoadedConfig> {
        if !self.exists() {
            return Err(ProvisionError::MissingServerConfig(self.path.clone()));
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| ProvisionError::io(&self.path, e))?;
        let config = parse_wg_config(&raw).map_err(|source| ProvisionError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let network = config
            .first_ipv4_address()
            .map(ServerNetwork::from)
            .ok_or_else(|| ProvisionError::MissingAddress(self.path.clone()))?;

        Ok(LoadedConfig { raw, config, network })
    }

    /// Replaces the configuration with `contents`, mode 0600.
    pub fn write(&self, contents: &str) -> Result<()> {
        write_atomic(&self.path, contents, SERVER_CONFIG_MODE)
    }

    /// Appends a rendered `[Peer]` section after the existing text.
    ///
    /// The previous contents are kept byte for byte; a blank line separates
    /// them from the new section.
    pub fn append_peer(&self, loaded: &LoadedConfig, section: &str) -> Result<()> {
        let mut contents = loaded.raw.clone();
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push('\n');
        contents.push_str(section);
        self.write(&contents)
    }
}

/// Writes `contents` to `path` through a temporary file and a rename.
pub fn write_atomic(path: &Path, contents: &str, mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ProvisionError::io(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ProvisionError::io(dir, e))?;
    temp.as_file()
        .set_permissions(Permissions::from_mode(mode))
        .map_err(|e| ProvisionError::io(temp.path(), e))?;
    temp.write_all(contents.as_bytes())
        .map_err(|e| ProvisionError::io(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| ProvisionError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| ProvisionError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
