//! Context naming the (table, field) pair an index key belongs to.

use std::fmt;

/// Context for index key derivation.
///
/// `field_name` is the name of the blind index column (for example
/// `email_ci_bidx`), never the plaintext attribute the index is computed
/// from. Two contexts that differ in either name always derive unrelated
/// keys.
///
/// # Example
///
/// ```
/// use blindex::context::IndexContext;
///
/// let ctx = IndexContext::for_index("users", "email_ci").with_version(2).build();
/// assert_eq!(ctx.field_name(), "email_ci_bidx_v2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexContext {
    table_name: String,
    field_name: String,
}

impl IndexContext {
    /// Creates a context from an explicit table and blind index column name.
    #[must_use]
    pub fn new(table_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), field_name: field_name.into() }
    }

    /// Starts a context for the blind index called `index_name`, using the
    /// conventional `<index_name>_bidx` column name.
    ///
    /// The name is the index's own, not the plaintext attribute it reads:
    /// an index `email_ci` over `email` lives in `email_ci_bidx`.
    #[must_use]
    pub fn for_index(table_name: impl Into<String>, index_name: &str) -> ColumnNaming {
        ColumnNaming {
            table_name: table_name.into(),
            index_name: index_name.to_string(),
            version: 1,
            legacy: false,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the blind index column name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for IndexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.table_name, self.field_name)
    }
}

/// Builder for the conventional column name of a blind index.
///
/// `email` becomes `email_bidx`; `legacy` prefixes `encrypted_`; a version
/// other than 1 appends `_v<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNaming {
    table_name: String,
    index_name: String,
    version: u32,
    legacy: bool,
}

impl ColumnNaming {
    /// Sets the index version. Rotated indexes use a new version.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Uses the legacy `encrypted_<index_name>_bidx` naming.
    #[must_use]
    pub const fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// Returns the column name without consuming the builder.
    #[must_use]
    pub fn column_name(&self) -> String {
        let mut name = String::new();
        if self.legacy {
            name.push_str("encrypted_");
        }
        name.push_str(&self.index_name);
        name.push_str("_bidx");
        if self.version != 1 {
            name.push_str(&format!("_v{}", self.version));
        }
        name
    }

    /// Returns the finished context.
    #[must_use]
    pub fn build(self) -> IndexContext {
        let field_name = self.column_name();
        IndexContext { table_name: self.table_name, field_name }
    }
}

impl From<ColumnNaming> for IndexContext {
    fn from(naming: ColumnNaming) -> Self {
        naming.build()
    }
}
