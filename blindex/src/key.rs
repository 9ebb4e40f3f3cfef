//! Key material, key validation and deferred key providers.
//!
//! Every key handed to the KDF engine must be 32 raw bytes. Keys usually
//! travel as 64-digit hex strings, so textual keys in that exact form are
//! decoded transparently; any other textual key is rejected.

use crate::error::Error;
use secrecy::{ExposeSecret, Secret, SecretString, SecretVec};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Size of every master and index key in bytes.
pub const KEY_SIZE: usize = 32;

/// Key material as supplied by a caller, before validation.
///
/// `Binary` holds raw bytes. `Text` holds a textual representation, which is
/// only usable when it is the 64-digit hex encoding of a 32-byte key (or when
/// the field explicitly opts into an insecure PBKDF2 key).
pub enum KeyMaterial {
    /// Raw binary bytes
    Binary(SecretVec<u8>),
    /// Textual key, typically hex
    Text(SecretString),
}

impl KeyMaterial {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary(SecretVec::new(bytes.into()))
    }

    /// Wraps a textual key, such as a 64-digit hex string.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(SecretString::new(text.into()))
    }

    /// Returns the bytes exactly as supplied, without decoding.
    ///
    /// Only the insecure PBKDF2 path consumes keys this way.
    #[must_use]
    pub fn as_raw_bytes(&self) -> &[u8] {
        match self {
            Self::Binary(bytes) => bytes.expose_secret(),
            Self::Text(text) => text.expose_secret().as_bytes(),
        }
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        match self {
            Self::Binary(bytes) => Self::binary(bytes.expose_secret().clone()),
            Self::Text(text) => Self::text(text.expose_secret().clone()),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(_) => f.write_str("KeyMaterial::Binary([REDACTED])"),
            Self::Text(_) => f.write_str("KeyMaterial::Text([REDACTED])"),
        }
    }
}

impl From<IndexKey> for KeyMaterial {
    fn from(key: IndexKey) -> Self {
        Self::binary(key.expose().to_vec())
    }
}

/// A validated 32-byte binary key (master key or per-field index key).
pub struct IndexKey(Secret<[u8; KEY_SIZE]>);

impl IndexKey {
    /// Wraps an array that is already known to be a binary key.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Secret::new(bytes))
    }

    /// Builds a key from a byte slice, checking its length.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyLength` if `bytes` is not 32 bytes long.
    pub fn from_slice(bytes: &[u8], name: &'static str) -> Result<Self, Error> {
        let array: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyLength { name, actual: bytes.len() })?;
        Ok(Self::new(array))
    }

    /// Exposes the raw key bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        self.0.expose_secret()
    }

    /// Lowercase hex encoding (64 characters) for storage or display.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.expose())
    }
}

impl Clone for IndexKey {
    fn clone(&self) -> Self {
        Self::new(*self.expose())
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IndexKey([REDACTED])")
    }
}

/// Returns true if `text` is exactly 64 hex digits (either case).
#[must_use]
pub fn is_hex_key(text: &str) -> bool {
    text.len() == KEY_SIZE * 2 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validates key material and normalizes it to a 32-byte binary key.
///
/// Textual 64-digit hex keys are decoded first. Any other textual key fails
/// with `InvalidKeyEncoding`; binary keys of the wrong length fail with
/// `InvalidKeyLength`.
///
/// # Errors
///
/// Returns `Error::InvalidKeyEncoding` or `Error::InvalidKeyLength`.
///
/// # Example
///
/// ```
/// use blindex::key::{decode_key, KeyMaterial};
///
/// let key = decode_key(&KeyMaterial::text("00".repeat(32)), "Key").unwrap();
/// assert_eq!(key.expose(), &[0u8; 32]);
/// ```
pub fn decode_key(material: &KeyMaterial, name: &'static str) -> Result<IndexKey, Error> {
    match material {
        KeyMaterial::Binary(bytes) => IndexKey::from_slice(bytes.expose_secret(), name),
        KeyMaterial::Text(text) => {
            let text = text.expose_secret();
            if !is_hex_key(text) {
                return Err(Error::InvalidKeyEncoding { name });
            }
            let bytes = Zeroizing::new(
                hex::decode(text).map_err(|_| Error::InvalidKeyEncoding { name })?,
            );
            IndexKey::from_slice(&bytes, name)
        }
    }
}

/// A deferred source of key material, evaluated when a digest is computed.
///
/// Implementations must be thread-safe (`Send + Sync`). Closures returning
/// `Option<KeyMaterial>` implement this trait directly.
///
/// # Example
///
/// ```
/// use blindex::key::{KeyMaterial, KeySource};
///
/// let source = KeySource::provider(|| Some(KeyMaterial::binary(vec![7u8; 32])));
/// assert!(source.is_deferred());
/// ```
pub trait KeyProvider: Send + Sync {
    /// Produces the key, or `None` if no key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the key source cannot be read or the key cannot
    /// be derived.
    fn provide_key(&self) -> Result<Option<KeyMaterial>, Error>;
}

impl<F> KeyProvider for F
where
    F: Fn() -> Option<KeyMaterial> + Send + Sync,
{
    fn provide_key(&self) -> Result<Option<KeyMaterial>, Error> {
        Ok(self())
    }
}

/// Either a literal key or a deferred provider.
#[derive(Clone)]
pub enum KeySource {
    /// Key supplied up front
    Key(KeyMaterial),
    /// Key produced on demand
    Provider(Arc<dyn KeyProvider>),
}

impl KeySource {
    /// A literal key.
    #[must_use]
    pub fn key(material: impl Into<KeyMaterial>) -> Self {
        Self::Key(material.into())
    }

    /// A deferred key provider.
    #[must_use]
    pub fn provider(provider: impl KeyProvider + 'static) -> Self {
        Self::Provider(Arc::new(provider))
    }

    /// Returns true if the key is produced on demand.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    /// Resolves the key, invoking a provider exactly once.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingKey` if the provider yields nothing, or the
    /// provider's own error if it fails.
    pub fn resolve(&self) -> Result<Cow<'_, KeyMaterial>, Error> {
        match self {
            Self::Key(material) => Ok(Cow::Borrowed(material)),
            Self::Provider(provider) => {
                provider.provide_key()?.map(Cow::Owned).ok_or(Error::MissingKey)
            }
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(material) => f.debug_tuple("Key").field(material).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<KeyMaterial> for KeySource {
    fn from(material: KeyMaterial) -> Self {
        Self::Key(material)
    }
}

impl From<IndexKey> for KeySource {
    fn from(key: IndexKey) -> Self {
        Self::Key(key.into())
    }
}
