//! Fields bound to their index key.
//!
//! An [`IndexedField`] ties an [`IndexContext`] and a [`FieldConfig`] to a
//! master key resolver. The index key is derived on first use and then
//! reused for every value computed through the field.

use crate::blind_index::{BlindIndexer, Digest, Value};
use crate::config::{Cost, FieldConfig, FieldOptions};
use crate::context::IndexContext;
use crate::error::Error;
use crate::key::{IndexKey, KeyMaterial, KeyProvider, KeySource};
use crate::key_generator::KeyGenerator;
use crate::master_key::{resolve_master_key, MasterKeyResolver};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Derives a field's index key from the master key once and caches it.
struct DerivedKeyProvider {
    context: IndexContext,
    resolver: Arc<dyn MasterKeyResolver>,
    key: OnceCell<IndexKey>,
}

impl DerivedKeyProvider {
    fn index_key(&self) -> Result<&IndexKey, Error> {
        self.key.get_or_try_init(|| {
            let master_key = resolve_master_key(self.resolver.as_ref())?;
            KeyGenerator::from_key(master_key).index_key(&self.context)
        })
    }
}

impl KeyProvider for DerivedKeyProvider {
    fn provide_key(&self) -> Result<Option<KeyMaterial>, Error> {
        Ok(Some(self.index_key()?.clone().into()))
    }
}

/// A blind-indexed field.
///
/// # Example
///
/// ```
/// use blindex::config::{Algorithm, FieldConfig};
/// use blindex::context::IndexContext;
/// use blindex::field::IndexedField;
/// use blindex::key::KeyMaterial;
///
/// let field = IndexedField::new(
///     IndexContext::new("users", "email_bidx"),
///     FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256),
///     KeyMaterial::text("0".repeat(64)),
/// );
///
/// let first = field.compute(Some("alice@example.com".into())).unwrap();
/// let second = field.compute(Some("alice@example.com".into())).unwrap();
/// assert_eq!(first, second);
/// ```
pub struct IndexedField {
    context: IndexContext,
    config: FieldConfig,
    derived: Option<Arc<DerivedKeyProvider>>,
    key: KeySource,
    indexer: BlindIndexer,
}

impl IndexedField {
    /// Creates a field whose index key is derived from the master key
    /// supplied by `resolver`.
    pub fn new(
        context: IndexContext,
        config: FieldConfig,
        resolver: impl MasterKeyResolver + 'static,
    ) -> Self {
        Self::with_resolver(context, config, Arc::new(resolver))
    }

    /// Like [`new`](Self::new), sharing a resolver between fields.
    #[must_use]
    pub fn with_resolver(
        context: IndexContext,
        config: FieldConfig,
        resolver: Arc<dyn MasterKeyResolver>,
    ) -> Self {
        let derived = Arc::new(DerivedKeyProvider {
            context: context.clone(),
            resolver,
            key: OnceCell::new(),
        });
        let key = KeySource::Provider(Arc::clone(&derived) as Arc<dyn KeyProvider>);
        Self { context, config, derived: Some(derived), key, indexer: BlindIndexer::default() }
    }

    /// Creates a field with an explicit key, bypassing the key hierarchy.
    #[must_use]
    pub fn with_key(context: IndexContext, config: FieldConfig, key: impl Into<KeySource>) -> Self {
        Self { context, config, derived: None, key: key.into(), indexer: BlindIndexer::default() }
    }

    /// Builds a field from its configuration-file definition.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingTable` if the definition has no table, or
    /// `Error::UnknownAlgorithm` for an unrecognized algorithm name.
    pub fn from_options(
        name: &str,
        options: &FieldOptions,
        resolver: Arc<dyn MasterKeyResolver>,
    ) -> Result<Self, Error> {
        let context = options.context(name).ok_or(Error::MissingTable)?;
        Ok(Self::with_resolver(context, options.to_config()?, resolver))
    }

    /// Replaces the global defaults used when computing.
    #[must_use]
    pub fn with_indexer(mut self, indexer: BlindIndexer) -> Self {
        self.indexer = indexer;
        self
    }

    /// Computes the blind index of `value`.
    ///
    /// # Errors
    ///
    /// See [`BlindIndexer::compute`]. Master key failures surface as
    /// `MissingMasterKey`, `InvalidMasterKey` or `KeyProvider`.
    pub fn compute(&self, value: Option<Value>) -> Result<Option<Digest>, Error> {
        self.indexer.compute(value, &self.key, &self.config)
    }

    /// Computes with per-call cost parameters.
    ///
    /// # Errors
    ///
    /// See [`compute`](Self::compute).
    pub fn compute_with_cost(
        &self,
        value: Option<Value>,
        cost: &Cost,
    ) -> Result<Option<Digest>, Error> {
        self.indexer.compute_with_cost(value, &self.key, &self.config, cost)
    }

    /// Returns the derived index key, deriving it if needed.
    ///
    /// Returns `Ok(None)` for fields built with an explicit key.
    ///
    /// # Errors
    ///
    /// Returns the master key or derivation error.
    pub fn index_key(&self) -> Result<Option<&IndexKey>, Error> {
        self.derived.as_deref().map(DerivedKeyProvider::index_key).transpose()
    }

    /// The (table, field) pair the index key is derived for.
    #[must_use]
    pub const fn context(&self) -> &IndexContext {
        &self.context
    }

    /// The field's digest configuration.
    #[must_use]
    pub const fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Key source handed to the indexer, usable with
    /// [`compute_blind_index`](crate::compute_blind_index).
    #[must_use]
    pub const fn key_source(&self) -> &KeySource {
        &self.key
    }
}

impl fmt::Debug for IndexedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedField")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
