use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Container name used when none (or a blank one) is configured.
pub const DEFAULT_COLLECTION_NAME: &str = "elmahcore_collection";

/// Database name used when none is configured.
pub const DEFAULT_DATABASE_NAME: &str = "elmah";

/// Byte bound applied to capped containers when the configured size is not positive.
pub const DEFAULT_CAPPED_MAX_BYTES: u64 = 50_000;

/// Document bound applied to capped containers when none is configured.
pub const DEFAULT_CAPPED_MAX_DOCUMENTS: u64 = 10_000;

/// Bounded-store policy for the error container.
///
/// When enabled, the container keeps at most `max_bytes` of records and at
/// most `max_documents` records; the oldest inserted records are evicted to
/// admit new ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CappedPolicy {
    pub enabled: bool,
    /// Maximum total size in bytes. Non-positive selects the default.
    pub max_bytes: i64,
    /// Maximum record count. Unset or non-positive selects the default.
    pub max_documents: Option<i64>,
}

impl CappedPolicy {
    /// No bounds: the container grows without eviction.
    pub fn uncapped() -> Self {
        Self::default()
    }

    /// A capped policy with explicit bounds.
    pub fn capped(max_bytes: i64, max_documents: Option<i64>) -> Self {
        Self {
            enabled: true,
            max_bytes,
            max_documents,
        }
    }

    pub fn effective_max_bytes(&self) -> u64 {
        u64::try_from(self.max_bytes)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CAPPED_MAX_BYTES)
    }

    pub fn effective_max_documents(&self) -> u64 {
        self.max_documents
            .and_then(|n| u64::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CAPPED_MAX_DOCUMENTS)
    }
}

/// Configuration for an error log store.
///
/// Supplied once at construction and immutable for the store's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend connection string. Ignored when a live client is supplied.
    pub connection_string: Option<String>,
    pub database_name: String,
    /// Container name; blank or unset selects [`DEFAULT_COLLECTION_NAME`].
    pub collection_name: Option<String>,
    pub capped: CappedPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            collection_name: None,
            capped: CappedPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from a TOML document.
    ///
    /// ```toml
    /// connection_string = "sqlite:///var/lib/app/errors.db"
    /// database_name = "app"
    /// collection_name = "errors"
    ///
    /// [capped]
    /// enabled = true
    /// max_bytes = 5000000
    /// max_documents = 10000
    /// ```
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn with_database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }

    pub fn with_collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    pub fn with_capped(mut self, capped: CappedPolicy) -> Self {
        self.capped = capped;
        self
    }

    /// The container name actually used.
    pub fn effective_collection_name(&self) -> &str {
        self.collection_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_COLLECTION_NAME)
    }

    /// The database name actually used.
    pub fn effective_database_name(&self) -> &str {
        let name = self.database_name.trim();
        if name.is_empty() {
            DEFAULT_DATABASE_NAME
        } else {
            name
        }
    }
}
