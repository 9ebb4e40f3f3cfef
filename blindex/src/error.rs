//! Error types for blind index operations.
//!
//! Every variant is a deterministic configuration or input failure. None of
//! them is transient, so callers should never retry on error.

use std::fmt;

/// Main error type for blind index operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No key was supplied, or a deferred key provider produced nothing
    #[error("missing key for blind index")]
    MissingKey,

    /// Key is textual and not a 64-digit hex encoding of a binary key
    #[error("{name} must use binary encoding")]
    InvalidKeyEncoding {
        /// Which key failed ("Key", "Master key")
        name: &'static str,
    },

    /// Key does not hold exactly 32 bytes
    #[error("{name} must be 32 bytes, got {actual}")]
    InvalidKeyLength {
        /// Which key failed ("Key", "Master key")
        name: &'static str,
        /// Length of the rejected key in bytes
        actual: usize,
    },

    /// Digest size is out of range for the selected algorithm
    #[error("invalid size {size}: {reason}")]
    InvalidSize {
        /// The rejected size
        size: usize,
        /// Constraint that was violated
        reason: &'static str,
    },

    /// A cost parameter is out of bounds
    #[error("invalid cost parameter {param}={value}: {reason}")]
    InvalidCostParameter {
        /// Parameter name (`t`, `m`, `iterations`, `n`, `r`, `p`)
        param: &'static str,
        /// The rejected value
        value: u64,
        /// Constraint that was violated
        reason: &'static str,
    },

    /// Algorithm name is not recognized
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Table name is empty
    #[error("missing table for key generation")]
    MissingTable,

    /// Field name is empty
    #[error("missing field for key generation")]
    MissingField,

    /// No master key could be resolved
    #[error("missing master key")]
    MissingMasterKey,

    /// Master key is not 32 binary bytes (or 64 hex digits)
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// The underlying KDF primitive rejected its input
    #[error("key derivation failed")]
    KeyDerivation,

    /// Key provider operation failed
    #[error("key provider error: {0}")]
    KeyProvider(#[from] KeyProviderError),
}

/// Errors raised by key providers and master key resolvers.
#[derive(Debug)]
pub enum KeyProviderError {
    /// The key does not exist at its source
    NotFound(String),

    /// The key source exists but could not be read or parsed
    Unavailable(String),

    /// Refused to replace an existing key
    AlreadyExists(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "key not found: {what}"),
            Self::Unavailable(msg) => write!(f, "key unavailable: {msg}"),
            Self::AlreadyExists(what) => write!(f, "key already exists: {what}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeyProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeyProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
