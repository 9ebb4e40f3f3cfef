//! File-based master key resolver for `blindex`.
//!
//! The master key is kept in a single hex file inside a key directory.
//! Suitable for development and testing environments.

#![warn(clippy::pedantic, clippy::nursery)]

use blindex::error::KeyProviderError;
use blindex::key::KeyMaterial;
use blindex::master_key::MasterKeyResolver;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Name of the master key file inside the key directory.
pub const MASTER_KEY_FILE: &str = "master.key";

/// Master key stored on disk.
///
/// ```text
/// keys/
/// └── master.key      (64 hex chars, 0600 permissions)
/// ```
#[derive(Debug, Clone)]
pub struct FileMasterKey {
    key_dir: PathBuf,
}

impl FileMasterKey {
    /// Opens an existing key directory.
    ///
    /// The key file itself is read on [`resolve`](MasterKeyResolver::resolve).
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::NotFound` if the directory does not exist.
    pub fn new(key_dir: impl Into<PathBuf>) -> Result<Self, KeyProviderError> {
        let key_dir = key_dir.into();
        if !key_dir.is_dir() {
            return Err(KeyProviderError::NotFound(format!(
                "key directory {}",
                key_dir.display()
            )));
        }
        Ok(Self { key_dir })
    }

    /// Creates the key directory if needed and writes a fresh master key.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::AlreadyExists` if a master key is already
    /// present, or `KeyProviderError::Io` if writing fails.
    pub fn init(key_dir: impl Into<PathBuf>) -> Result<Self, KeyProviderError> {
        let key_dir = key_dir.into();
        fs::create_dir_all(&key_dir)?;

        let path = key_dir.join(MASTER_KEY_FILE);
        let mut file = open_new(&path).map_err(|err| {
            if err.kind() == ErrorKind::AlreadyExists {
                KeyProviderError::AlreadyExists(path.display().to_string())
            } else {
                KeyProviderError::Io(err)
            }
        })?;

        let key = Zeroizing::new(blindex::generate_key());
        file.write_all(key.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), "wrote master key file");
        Ok(Self { key_dir })
    }

    /// Path of the master key file.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.key_dir.join(MASTER_KEY_FILE)
    }

    /// Directory holding the key file.
    #[must_use]
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }
}

#[cfg(unix)]
fn open_new(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_new(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

impl MasterKeyResolver for FileMasterKey {
    fn resolve(&self) -> Result<KeyMaterial, KeyProviderError> {
        let path = self.key_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(KeyProviderError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(path = %path.display(), "resolved master key from file");
        Ok(KeyMaterial::text(contents.trim()))
    }
}
