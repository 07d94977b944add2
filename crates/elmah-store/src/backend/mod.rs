//! Backend driver adapters.
//!
//! An [`ErrorLogBackend`] is the thin binding between an error log and a
//! concrete database client: container bootstrap, single-record inserts, and
//! the three read queries. Everything else (id generation, mapping, paging
//! policy) lives in [`ErrorLogStore`](crate::ErrorLogStore).

use std::ops::Deref;
use std::sync::Arc;

use crate::config::CappedPolicy;
use crate::error::{StoreError, StoreResult};
use crate::record::{PersistedRecord, RecordId};

pub mod memory;
pub mod sqlite;

/// Longest database or container name accepted by the built-in backends.
pub const MAX_NAME_LEN: usize = 120;

/// Outcome of [`ErrorLogBackend::ensure_container`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bootstrap {
    /// The container was absent and has been created.
    Created,
    /// The container already existed and was left untouched.
    Existing,
}

/// Physical properties of a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    pub capped: bool,
    /// Byte bound; `None` when uncapped.
    pub max_bytes: Option<u64>,
    /// Record bound; `None` when uncapped.
    pub max_documents: Option<u64>,
    pub count: u64,
}

/// Storage backend for error records.
///
/// Implementations must be thread-safe (`Send + Sync`) and must:
/// - make `ensure_container` idempotent and safe under concurrent first use,
///   never creating the same container twice with different bounds;
/// - evict the oldest inserted records of a capped container (FIFO by
///   insertion, not by the error's timestamp) so both bounds hold;
/// - write each record atomically;
/// - order `find_page` by descending `Time`, ties broken by most recent
///   insertion first;
/// - report timeouts, lock failures and connection loss as
///   `BackendUnavailable`.
pub trait ErrorLogBackend: Send + Sync {
    /// Short human-readable backend name (e.g. "SQLite").
    fn kind(&self) -> &'static str;

    /// Create the container if it does not exist.
    fn ensure_container(
        &self,
        database: &str,
        container: &str,
        policy: &CappedPolicy,
    ) -> StoreResult<Bootstrap>;

    /// Describe a container, or `None` if it does not exist.
    fn container_info(&self, database: &str, container: &str) -> StoreResult<Option<ContainerInfo>>;

    /// Insert one record and return its store-internal id.
    fn insert(
        &self,
        database: &str,
        container: &str,
        record: PersistedRecord,
    ) -> StoreResult<RecordId>;

    /// First record whose `ErrorId` equals `error_id`.
    fn find_by_error_id(
        &self,
        database: &str,
        container: &str,
        error_id: &str,
    ) -> StoreResult<Option<PersistedRecord>>;

    /// Up to `limit` records after skipping `skip`, most recent first.
    fn find_page(
        &self,
        database: &str,
        container: &str,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<PersistedRecord>>;

    /// Number of records in the container.
    fn count(&self, database: &str, container: &str) -> StoreResult<u64>;
}

/// Backends that can be opened from a connection string.
pub trait Connect: Sized {
    fn connect(connection_string: &str) -> StoreResult<Self>;
}

/// How a store holds its backend client.
///
/// A `Shared` client was supplied by the host and is only borrowed for the
/// store's lifetime. An `Owned` client was opened by the store from a
/// connection string and is released when the store is dropped.
#[derive(Debug)]
pub enum BackendHandle<B> {
    Shared(Arc<B>),
    Owned(B),
}

impl<B> BackendHandle<B> {
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl<B> Deref for BackendHandle<B> {
    type Target = B;

    fn deref(&self) -> &B {
        match self {
            Self::Shared(b) => b,
            Self::Owned(b) => b,
        }
    }
}

impl<B> From<Arc<B>> for BackendHandle<B> {
    fn from(client: Arc<B>) -> Self {
        Self::Shared(client)
    }
}

/// Check that a database or container name is usable by every backend.
///
/// Names must be 1..=`MAX_NAME_LEN` characters of ASCII letters, digits,
/// `_`, `-` or `.`, and must not use a reserved prefix.
pub fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with("sqlite_")
        && !name.starts_with("system.")
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidContainerName(name.to_string()))
    }
}
