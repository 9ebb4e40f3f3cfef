//! Field configuration for blind index computation.
//!
//! A [`FieldConfig`] describes how one indexed field is hashed. It is built
//! once, when the schema is defined, and never mutated afterwards. Values the
//! field leaves unset fall back to a [`Defaults`] object owned by the
//! [`BlindIndexer`](crate::blind_index::BlindIndexer).
//!
//! [`FieldOptions`] is the serde-facing form used when field definitions are
//! loaded from a file. Algorithm names are parsed there, so an unknown name
//! is reported while loading configuration rather than while hashing.

use crate::blind_index::Value;
use crate::context::IndexContext;
use crate::error::Error;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Key derivation algorithm used to compute a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// PBKDF2 with HMAC-SHA256 (legacy default)
    Pbkdf2Sha256,
    /// Argon2i, limited to 32-byte digests
    Argon2i,
    /// Argon2id (default)
    #[default]
    Argon2id,
    /// scrypt
    Scrypt,
}

impl Algorithm {
    /// Canonical configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pbkdf2Sha256 => "pbkdf2_sha256",
            Self::Argon2i => "argon2i",
            Self::Argon2id => "argon2id",
            Self::Scrypt => "scrypt",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parses a canonical name or one of the legacy aliases
    /// (`pbkdf2_hmac`, `argon2`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pbkdf2_sha256" | "pbkdf2_hmac" => Ok(Self::Pbkdf2Sha256),
            "argon2i" | "argon2" => Ok(Self::Argon2i),
            "argon2id" => Ok(Self::Argon2id),
            "scrypt" => Ok(Self::Scrypt),
            other => Err(Error::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm-specific cost parameters. Unset entries fall through to the next
/// layer of defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cost {
    /// PBKDF2 iteration count
    pub iterations: Option<u32>,
    /// Argon2 time cost
    pub t: Option<u32>,
    /// Argon2 memory cost, as a power of two in KiB
    pub m: Option<u32>,
    /// scrypt work factor
    pub n: Option<u64>,
    /// scrypt block size
    pub r: Option<u32>,
    /// scrypt parallelism
    pub p: Option<u32>,
}

impl Cost {
    /// An empty cost map.
    #[must_use]
    pub const fn new() -> Self {
        Self { iterations: None, t: None, m: None, n: None, r: None, p: None }
    }

    /// Sets the PBKDF2 iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Sets the Argon2 time cost.
    #[must_use]
    pub const fn with_t(mut self, t: u32) -> Self {
        self.t = Some(t);
        self
    }

    /// Sets the Argon2 memory cost exponent.
    #[must_use]
    pub const fn with_m(mut self, m: u32) -> Self {
        self.m = Some(m);
        self
    }

    /// Sets the scrypt parameters.
    #[must_use]
    pub const fn with_scrypt(mut self, n: u64, r: u32, p: u32) -> Self {
        self.n = Some(n);
        self.r = Some(r);
        self.p = Some(p);
        self
    }

    /// Fills every unset entry of `self` from `fallback`.
    #[must_use]
    pub const fn or(self, fallback: Self) -> Self {
        Self {
            iterations: or_option(self.iterations, fallback.iterations),
            t: or_option(self.t, fallback.t),
            m: or_option(self.m, fallback.m),
            n: or_option(self.n, fallback.n),
            r: or_option(self.r, fallback.r),
            p: or_option(self.p, fallback.p),
        }
    }
}

const fn or_option<T: Copy>(value: Option<T>, fallback: Option<T>) -> Option<T> {
    match value {
        Some(v) => Some(v),
        None => fallback,
    }
}

/// Pre-hash transform applied to a value (for example lowercasing).
///
/// Returning `None` means the transformed value is absent and no digest is
/// computed.
pub type Expression = Arc<dyn Fn(Value) -> Option<Value> + Send + Sync>;

/// How the raw digest is returned.
#[derive(Clone, Default)]
pub enum Encode {
    /// Standard base64 with padding and no line breaks
    #[default]
    Base64,
    /// Raw digest bytes
    Raw,
    /// Caller-supplied text encoding
    Custom(Arc<dyn Fn(&[u8]) -> String + Send + Sync>),
}

impl Encode {
    /// Wraps a custom encoder.
    #[must_use]
    pub fn custom(encoder: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(encoder))
    }
}

impl From<bool> for Encode {
    fn from(encode: bool) -> Self {
        if encode {
            Self::Base64
        } else {
            Self::Raw
        }
    }
}

impl fmt::Debug for Encode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => f.write_str("Base64"),
            Self::Raw => f.write_str("Raw"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Process-wide defaults, passed explicitly to the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defaults {
    /// Algorithm for fields that do not choose one
    pub algorithm: Algorithm,
    /// Global cost parameters, below field and per-call costs
    pub cost: Cost,
    /// Digest size for fields that do not choose one
    pub size: usize,
}

impl Defaults {
    /// Defaults of the original PBKDF2-based scheme: PBKDF2-HMAC-SHA256 with
    /// 10000 iterations.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            algorithm: Algorithm::Pbkdf2Sha256,
            cost: Cost::new().with_iterations(crate::kdf::DEFAULT_PBKDF2_ITERATIONS),
            size: crate::kdf::MAX_SIZE,
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self { algorithm: Algorithm::default(), cost: Cost::new(), size: crate::kdf::MAX_SIZE }
    }
}

/// Configuration of one indexed field.
///
/// # Example
///
/// ```
/// use blindex::config::{Algorithm, Cost, FieldConfig};
///
/// let config = FieldConfig::new()
///     .with_algorithm(Algorithm::Pbkdf2Sha256)
///     .with_cost(Cost::new().with_iterations(10_000))
///     .with_size(16);
/// assert_eq!(config.algorithm(), Some(Algorithm::Pbkdf2Sha256));
/// ```
#[derive(Clone, Default)]
pub struct FieldConfig {
    algorithm: Option<Algorithm>,
    cost: Cost,
    slow: bool,
    size: Option<usize>,
    insecure_key: bool,
    expression: Option<Expression>,
    encode: Encode,
}

impl FieldConfig {
    /// A configuration that takes everything from the indexer defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Sets field-level cost parameters.
    #[must_use]
    pub const fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = cost;
        self
    }

    /// Uses the slow Argon2id profile (`t = 4`, `m = 15`) for unset costs.
    #[must_use]
    pub const fn slow(mut self, slow: bool) -> Self {
        self.slow = slow;
        self
    }

    /// Sets the digest size in bytes.
    #[must_use]
    pub const fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Accepts keys of any format and length. Only honored for PBKDF2.
    #[must_use]
    pub const fn insecure_key(mut self, insecure_key: bool) -> Self {
        self.insecure_key = insecure_key;
        self
    }

    /// Sets a pre-hash transform.
    #[must_use]
    pub fn with_expression(
        mut self,
        expression: impl Fn(Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.expression = Some(Arc::new(expression));
        self
    }

    /// Sets the output encoding.
    #[must_use]
    pub fn with_encode(mut self, encode: impl Into<Encode>) -> Self {
        self.encode = encode.into();
        self
    }

    /// Returns the configured algorithm, if any.
    #[must_use]
    pub const fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Returns the field-level cost parameters.
    #[must_use]
    pub const fn cost(&self) -> &Cost {
        &self.cost
    }

    /// Returns true if the slow profile is selected.
    #[must_use]
    pub const fn is_slow(&self) -> bool {
        self.slow
    }

    /// Returns the configured size, if any.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        self.size
    }

    /// Returns true if key validation may be skipped.
    #[must_use]
    pub const fn is_insecure_key(&self) -> bool {
        self.insecure_key
    }

    /// Returns the pre-hash transform, if any.
    #[must_use]
    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// Returns the output encoding.
    #[must_use]
    pub const fn encode(&self) -> &Encode {
        &self.encode
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("algorithm", &self.algorithm)
            .field("cost", &self.cost)
            .field("slow", &self.slow)
            .field("size", &self.size)
            .field("insecure_key", &self.insecure_key)
            .field("expression", &self.expression.as_ref().map(|_| ".."))
            .field("encode", &self.encode)
            .finish()
    }
}

const fn default_true() -> bool {
    true
}

/// Field definition as loaded from a configuration file.
///
/// ```toml
/// [fields.email]
/// table = "users"
/// algorithm = "argon2id"
/// size = 16
/// cost = { t = 4, m = 15 }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldOptions {
    /// Table holding the field, used for index key derivation
    pub table: Option<String>,
    /// Plaintext attribute the index is computed from; defaults to the
    /// field's own name. Never part of the column name or index key.
    pub attribute: Option<String>,
    /// Explicit blind index column name
    pub bidx_attribute: Option<String>,
    /// Index version, appended to the column name when not 1
    pub version: Option<u32>,
    /// Use the `encrypted_<name>_bidx` column naming
    #[serde(default)]
    pub legacy: bool,
    /// Algorithm name, canonical or legacy alias
    pub algorithm: Option<String>,
    /// Field-level PBKDF2 iterations, below `cost.iterations`
    pub iterations: Option<u32>,
    /// Field-level cost parameters
    #[serde(default)]
    pub cost: Cost,
    /// Digest size in bytes
    pub size: Option<usize>,
    /// Slow Argon2id profile
    #[serde(default)]
    pub slow: bool,
    /// Skip key validation for PBKDF2
    #[serde(default)]
    pub insecure_key: bool,
    /// Base64-encode the digest (`true`) or return raw bytes (`false`)
    #[serde(default = "default_true")]
    pub encode: bool,
}

impl FieldOptions {
    /// Builds the field configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownAlgorithm` if `algorithm` is not recognized.
    pub fn to_config(&self) -> Result<FieldConfig, Error> {
        let mut config = FieldConfig::new()
            .with_cost(self.cost.or(Cost { iterations: self.iterations, ..Cost::new() }))
            .slow(self.slow)
            .insecure_key(self.insecure_key)
            .with_encode(self.encode);
        if let Some(algorithm) = &self.algorithm {
            config = config.with_algorithm(algorithm.parse()?);
        }
        if let Some(size) = self.size {
            config = config.with_size(size);
        }
        Ok(config)
    }

    /// Builds the index context for the blind index named `name`, or `None`
    /// if no table is configured.
    ///
    /// The column is `bidx_attribute` when set, otherwise derived from
    /// `name`. `attribute` only selects the plaintext source, so two indexes
    /// over the same attribute still get distinct columns and keys.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<IndexContext> {
        let table = self.table.as_deref()?;
        if let Some(bidx_attribute) = &self.bidx_attribute {
            return Some(IndexContext::new(table, bidx_attribute.as_str()));
        }
        Some(
            IndexContext::for_index(table, name)
                .with_version(self.version.unwrap_or(1))
                .legacy(self.legacy)
                .build(),
        )
    }
}
