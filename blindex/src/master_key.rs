//! Master key resolution.
//!
//! The master key is owned by application start-up and handed to the key
//! hierarchy through a [`MasterKeyResolver`]. [`LazyMasterKey`] memoizes a
//! resolver so the key is read and decoded at most once, even when several
//! threads ask for it at the same time.

use crate::error::{Error, KeyProviderError};
use crate::key::{IndexKey, KeyMaterial, KEY_SIZE};
use crate::key_generator::{decode_master_key, KeyGenerator};
use once_cell::sync::OnceCell;
use rand::{rngs::OsRng, RngCore};
use std::env::VarError;
use zeroize::Zeroizing;

/// Environment variable read by [`EnvMasterKey`] by default.
pub const MASTER_KEY_ENV: &str = "BLIND_INDEX_MASTER_KEY";

/// Supplies the master key.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait MasterKeyResolver: Send + Sync {
    /// Returns the master key material.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::NotFound` if no master key is configured,
    /// or another `KeyProviderError` if it cannot be read.
    fn resolve(&self) -> Result<KeyMaterial, KeyProviderError>;
}

impl MasterKeyResolver for KeyMaterial {
    fn resolve(&self) -> Result<KeyMaterial, KeyProviderError> {
        Ok(self.clone())
    }
}

/// Reads a hex master key from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMasterKey {
    var: String,
}

impl EnvMasterKey {
    /// Reads `BLIND_INDEX_MASTER_KEY`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_var(MASTER_KEY_ENV)
    }

    /// Reads a custom variable.
    #[must_use]
    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns the variable name.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvMasterKey {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterKeyResolver for EnvMasterKey {
    fn resolve(&self) -> Result<KeyMaterial, KeyProviderError> {
        match std::env::var(&self.var) {
            Ok(value) => {
                tracing::debug!(var = %self.var, "resolved master key from environment");
                Ok(KeyMaterial::text(value))
            }
            Err(VarError::NotPresent) => Err(KeyProviderError::NotFound(self.var.clone())),
            Err(VarError::NotUnicode(_)) => {
                Err(KeyProviderError::Unavailable(format!("{} is not valid unicode", self.var)))
            }
        }
    }
}

/// Resolves and decodes a master key.
///
/// # Errors
///
/// Returns `Error::MissingMasterKey` if the resolver has no key,
/// `Error::InvalidMasterKey` if the key is malformed, or
/// `Error::KeyProvider` if the resolver fails.
pub fn resolve_master_key<R>(resolver: &R) -> Result<IndexKey, Error>
where
    R: MasterKeyResolver + ?Sized,
{
    match resolver.resolve() {
        Ok(material) => decode_master_key(&material),
        Err(KeyProviderError::NotFound(_)) => Err(Error::MissingMasterKey),
        Err(err) => Err(err.into()),
    }
}

/// A master key resolved on first use and cached for the process lifetime.
///
/// # Example
///
/// ```
/// use blindex::key::KeyMaterial;
/// use blindex::master_key::LazyMasterKey;
///
/// let master = LazyMasterKey::new(KeyMaterial::text("0".repeat(64)));
/// assert_eq!(master.get().unwrap().expose(), &[0u8; 32]);
/// ```
pub struct LazyMasterKey<R> {
    resolver: R,
    key: OnceCell<IndexKey>,
}

impl<R: MasterKeyResolver> LazyMasterKey<R> {
    /// Wraps a resolver. Nothing is resolved until [`get`](Self::get).
    pub const fn new(resolver: R) -> Self {
        Self { resolver, key: OnceCell::new() }
    }

    /// Returns the master key, resolving it on first call.
    ///
    /// A failed resolution is not cached; the next call tries again.
    ///
    /// # Errors
    ///
    /// See [`resolve_master_key`].
    pub fn get(&self) -> Result<&IndexKey, Error> {
        self.key.get_or_try_init(|| resolve_master_key(&self.resolver))
    }

    /// Returns a key generator over the resolved master key.
    ///
    /// # Errors
    ///
    /// See [`resolve_master_key`].
    pub fn key_generator(&self) -> Result<KeyGenerator, Error> {
        Ok(KeyGenerator::from_key(self.get()?.clone()))
    }
}

impl<R: MasterKeyResolver> MasterKeyResolver for LazyMasterKey<R> {
    fn resolve(&self) -> Result<KeyMaterial, KeyProviderError> {
        match self.get() {
            Ok(key) => Ok(key.clone().into()),
            Err(Error::MissingMasterKey) => Err(KeyProviderError::NotFound("master key".into())),
            Err(Error::KeyProvider(err)) => Err(err),
            Err(err) => Err(KeyProviderError::Unavailable(err.to_string())),
        }
    }
}

/// Generates a random master key as 64 lowercase hex characters.
///
/// # Example
///
/// ```
/// let key = blindex::generate_key();
/// assert_eq!(key.len(), 64);
/// ```
#[must_use]
pub fn generate_key() -> String {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut key[..]);
    hex::encode(&key[..])
}
