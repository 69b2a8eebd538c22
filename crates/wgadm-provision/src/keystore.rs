//! On-disk key files.
//!
//! Each identity is stored as two files in the key directory:
//! `<name>_private.key` (mode 0600) and `<name>_public.key` (mode 0644), each
//! holding the base64 key followed by a newline.

use std::collections::HashMap;
use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;
use wgadm_wireguard::{KeyPair, PublicKey};

use crate::error::{ProvisionError, Result};

/// Mode of private key files.
pub const PRIVATE_KEY_MODE: u32 = 0o600;

/// Mode of public key files.
pub const PUBLIC_KEY_MODE: u32 = 0o644;

const KEY_DIR_MODE: u32 = 0o700;

const PUBLIC_SUFFIX: &str = "_public.key";

/// Key files in one directory.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Creates a store over `dir`. Nothing is touched until a write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The key directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `<name>_private.key`.
    #[must_use]
    pub fn private_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_private.key"))
    }

    /// Path of `<name>_public.key`.
    #[must_use]
    pub fn public_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{PUBLIC_SUFFIX}"))
    }

    /// Whether either key file for `name` exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.private_path(name).exists() || self.public_path(name).exists()
    }

    /// Writes both key files for `name`, replacing any previous ones.
    ///
    /// The directory is created with mode 0700 if missing. Modes are set
    /// explicitly after writing so the process umask has no say.
    pub fn write_pair(&self, name: &str, pair: &KeyPair) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| ProvisionError::io(&self.dir, e))?;
            fs::set_permissions(&self.dir, Permissions::from_mode(KEY_DIR_MODE))
                .map_err(|e| ProvisionError::io(&self.dir, e))?;
        }

        write_key_file(&self.private_path(name), &pair.private_key().to_base64(), PRIVATE_KEY_MODE)?;
        write_key_file(&self.public_path(name), &pair.public_key().to_base64(), PUBLIC_KEY_MODE)?;

        debug!(name, dir = %self.dir.display(), "wrote key pair");
        Ok(())
    }

    /// Reads the public key of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] when the file cannot be read and
    /// [`ProvisionError::Parse`] when it does not hold a valid key.
    pub fn read_public(&self, name: &str) -> Result<PublicKey> {
        let path = self.public_path(name);
        let contents = fs::read_to_string(&path).map_err(|e| ProvisionError::io(&path, e))?;
        PublicKey::from_base64(&contents).map_err(|source| ProvisionError::Parse { path, source })
    }

    /// Maps every readable `<name>_public.key` in the directory to its name.
    ///
    /// Unreadable or malformed files are skipped.
    pub fn names_by_public_key(&self) -> Result<HashMap<PublicKey, String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(ProvisionError::io(&self.dir, e)),
        };

        let mut names = HashMap::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(PUBLIC_SUFFIX)) else {
                continue;
            };
            match self.read_public(name) {
                Ok(key) => {
                    names.insert(key, name.to_string());
                }
                Err(e) => debug!(name, error = %e, "skipping key file"),
            }
        }
        Ok(names)
    }
}

fn write_key_file(path: &Path, key: &str, mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| ProvisionError::io(path, e))?;
    file.set_permissions(Permissions::from_mode(mode))
        .map_err(|e| ProvisionError::io(path, e))?;
    writeln!(file, "{key}").map_err(|e| ProvisionError::io(path, e))?;
    file.sync_all().map_err(|e| ProvisionError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).expect("metadata").permissions().mode() & 0o777
    }

    #[test]
    fn write_pair_sets_modes_and_contents() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path().join("keys"));
        let pair = KeyPair::generate();

        store.write_pair("client1", &pair).expect("write");

        let private = store.private_path("client1");
        let public = store.public_path("client1");
        assert_eq!(mode_of(&private), 0o600);
        assert_eq!(mode_of(&public), 0o644);
        assert_eq!(mode_of(store.dir()), 0o700);

        let contents = fs::read_to_string(&public).expect("read");
        assert_eq!(contents, format!("{}\n", pair.public_key().to_base64()));
        assert_eq!(contents.trim_end().len(), 44);
    }

    #[test]
    fn read_public_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path());
        let pair = KeyPair::generate();
        store.write_pair("server", &pair).expect("write");

        assert_eq!(store.read_public("server").expect("read"), *pair.public_key());
    }

    #[test]
    fn has_reports_existing_names() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path());
        assert!(!store.has("client2"));
        store.write_pair("client2", &KeyPair::generate()).expect("write");
        assert!(store.has("client2"));
        assert!(!store.has("client3"));
    }

    #[test]
    fn names_by_public_key_skips_junk() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path());
        let server = KeyPair::generate();
        let client = KeyPair::generate();
        store.write_pair("server", &server).expect("write");
        store.write_pair("client1", &client).expect("write");
        fs::write(dir.path().join("broken_public.key"), "garbage\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "hello\n").expect("write");

        let names = store.names_by_public_key().expect("scan");
        assert_eq!(names.len(), 2);
        assert_eq!(names.get(client.public_key()).map(String::as_str), Some("client1"));
        assert_eq!(names.get(server.public_key()).map(String::as_str), Some("server"));
    }

    #[test]
    fn names_by_public_key_missing_dir_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path().join("absent"));
        assert!(store.names_by_public_key().expect("scan").is_empty());
    }

    #[test]
    fn read_public_missing_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path());
        assert!(matches!(store.read_public("server"), Err(ProvisionError::Io { .. })));
    }

    #[test]
    fn read_public_garbage_is_parse_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyStore::new(dir.path());
        fs::write(store.public_path("server"), "not a key\n").expect("write");
        assert!(matches!(store.read_public("server"), Err(ProvisionError::Parse { .. })));
    }
}
