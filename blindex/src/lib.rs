//! # blindex
//!
//! Deterministic blind indexes for searchable encrypted fields.
//!
//! A blind index is a keyed one-way digest of a plaintext value. Storing it
//! next to the ciphertext allows equality lookups and uniqueness checks
//! without revealing the plaintext to the database.
//!
//! ## Features
//!
//! - PBKDF2-HMAC-SHA256, Argon2i, Argon2id and scrypt with bounded costs
//! - Per-field index keys derived from a single master key
//! - Hex or binary keys, auto-detected
//! - Base64, raw or custom digest encodings
//!
//! ## Example
//!
//! ```rust
//! use blindex::prelude::*;
//!
//! let master_key = KeyMaterial::text(blindex::generate_key());
//! let index_key = KeyGenerator::new(&master_key)?
//!     .index_key(&IndexContext::new("users", "email_bidx"))?;
//!
//! let config = FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256);
//! let digest = compute_blind_index(
//!     Some("alice@example.com".into()),
//!     &KeySource::key(index_key),
//!     &config,
//! )?;
//! assert_eq!(digest.unwrap().as_text().unwrap().len(), 44);
//! # Ok::<(), blindex::Error>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blind_index;
pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod kdf;
pub mod key;
pub mod key_generator;
pub mod master_key;

pub use blind_index::compute_blind_index;
pub use error::{Error, KeyProviderError};
pub use key_generator::derive_index_key;
pub use master_key::generate_key;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::blind_index::{compute_blind_index, BlindIndexer, Digest, Value};
    pub use crate::config::{Algorithm, Cost, Defaults, Encode, FieldConfig, FieldOptions};
    pub use crate::context::IndexContext;
    pub use crate::error::{Error, KeyProviderError};
    pub use crate::field::IndexedField;
    pub use crate::key::{IndexKey, KeyMaterial, KeyProvider, KeySource};
    pub use crate::key_generator::{derive_index_key, DerivedKey, KeyGenerator};
    pub use crate::master_key::{EnvMasterKey, LazyMasterKey, MasterKeyResolver};
}
