//! Blind index generation for searchable encryption.
//!
//! A blind index is a keyed, one-way digest of a plaintext value stored
//! next to its ciphertext, so equality lookups and uniqueness checks work
//! without decrypting. The index key is used as the KDF salt; the value is
//! the KDF password.

use crate::config::{Algorithm, Cost, Defaults, Encode, FieldConfig};
use crate::error::Error;
use crate::kdf::{self, KdfParams, SLOW_ARGON2_M, SLOW_ARGON2_T};
use crate::key::{decode_key, KeySource};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// A value to index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Text, hashed as its UTF-8 bytes
    Text(String),
    /// Binary data, hashed as is
    Bytes(Vec<u8>),
}

impl Value {
    /// Canonical byte representation used as KDF input.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// A computed blind index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Digest {
    /// Base64 or custom text encoding
    Text(String),
    /// Raw digest bytes
    Bytes(Vec<u8>),
}

impl Digest {
    /// Returns the text form, if the digest was encoded.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Returns the bytes to store: encoded text as UTF-8, or the raw digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// Computes blind indexes against a set of process-wide defaults.
///
/// The indexer is immutable and holds no keys, so one instance can be shared
/// freely across threads.
///
/// # Example
///
/// ```
/// use blindex::blind_index::{BlindIndexer, Value};
/// use blindex::config::{Defaults, FieldConfig};
/// use blindex::key::{KeyMaterial, KeySource};
///
/// let indexer = BlindIndexer::new(Defaults::legacy());
/// let key = KeySource::key(KeyMaterial::binary(vec![0u8; 32]));
/// let digest = indexer
///     .compute(Some(Value::from("test@example.org")), &key, &FieldConfig::new())
///     .unwrap()
///     .unwrap();
/// assert_eq!(digest.as_text(), Some("Ltdx3uvWmIH4CZktGiLvqXT3LpIozHnANx2DVjDznbQ="));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlindIndexer {
    defaults: Defaults,
}

impl BlindIndexer {
    /// Creates an indexer over `defaults`.
    #[must_use]
    pub const fn new(defaults: Defaults) -> Self {
        Self { defaults }
    }

    /// Returns the defaults.
    #[must_use]
    pub const fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Computes the blind index of `value` for a field.
    ///
    /// Returns `Ok(None)` when `value` is `None`, or when the field's
    /// expression maps it to `None`. The key source is not touched in that
    /// case.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey`, `InvalidKeyEncoding`, `InvalidKeyLength`,
    /// `InvalidSize` or `InvalidCostParameter` for bad configuration, or the
    /// key provider's error if a deferred key cannot be produced.
    pub fn compute(
        &self,
        value: Option<Value>,
        key: &KeySource,
        config: &FieldConfig,
    ) -> Result<Option<Digest>, Error> {
        self.compute_with_cost(value, key, config, &Cost::new())
    }

    /// Like [`compute`](Self::compute), with per-call cost parameters that
    /// take precedence over every configured cost.
    ///
    /// # Errors
    ///
    /// See [`compute`](Self::compute).
    pub fn compute_with_cost(
        &self,
        value: Option<Value>,
        key: &KeySource,
        config: &FieldConfig,
        cost: &Cost,
    ) -> Result<Option<Digest>, Error> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = match config.expression() {
            Some(expression) => match expression(value) {
                Some(value) => value,
                None => return Ok(None),
            },
            None => value,
        };

        let algorithm = config.algorithm().unwrap_or(self.defaults.algorithm);

        let material = key.resolve()?;
        let decoded;
        let key_bytes: &[u8] = if config.is_insecure_key() && algorithm == Algorithm::Pbkdf2Sha256
        {
            material.as_raw_bytes()
        } else {
            decoded = decode_key(&material, "Key")?;
            decoded.expose()
        };

        let size = config.size().unwrap_or(self.defaults.size);
        kdf::validate_size(algorithm, size)?;

        let params = KdfParams::new(algorithm, &self.effective_cost(algorithm, config, cost))?;
        let raw = kdf::derive(value.as_bytes(), key_bytes, &params, size)?;

        Ok(Some(encode(config.encode(), raw)))
    }

    /// Per-call cost, then field cost, then the slow profile, then the
    /// global defaults. Hardcoded algorithm defaults apply last, in
    /// [`KdfParams::new`].
    fn effective_cost(&self, algorithm: Algorithm, config: &FieldConfig, cost: &Cost) -> Cost {
        let slow = if config.is_slow() && algorithm == Algorithm::Argon2id {
            Cost::new().with_t(SLOW_ARGON2_T).with_m(SLOW_ARGON2_M)
        } else {
            Cost::new()
        };
        cost.or(*config.cost()).or(slow).or(self.defaults.cost)
    }
}

fn encode(encode: &Encode, raw: Vec<u8>) -> Digest {
    match encode {
        Encode::Base64 => Digest::Text(STANDARD.encode(raw)),
        Encode::Raw => Digest::Bytes(raw),
        Encode::Custom(encoder) => Digest::Text(encoder(&raw)),
    }
}

/// Computes a blind index with the default settings (Argon2id, 32 bytes,
/// base64) for anything `config` leaves unset.
///
/// # Errors
///
/// See [`BlindIndexer::compute`].
///
/// # Example
///
/// ```
/// use blindex::compute_blind_index;
/// use blindex::blind_index::Value;
/// use blindex::config::{Algorithm, FieldConfig};
/// use blindex::key::{KeyMaterial, KeySource};
///
/// let key = KeySource::key(KeyMaterial::text("0".repeat(64)));
/// let config = FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256);
///
/// let digest = compute_blind_index(Some(Value::from("alice@example.com")), &key, &config)
///     .unwrap();
/// assert!(digest.is_some());
/// assert!(compute_blind_index(None, &key, &config).unwrap().is_none());
/// ```
pub fn compute_blind_index(
    value: Option<Value>,
    key: &KeySource,
    config: &FieldConfig,
) -> Result<Option<Digest>, Error> {
    BlindIndexer::default().compute(value, key, config)
}
