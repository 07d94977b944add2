//! Persistent error log storage for ELMAH.
//!
//! An error log stores each captured error as one record in a named
//! container. The record carries the canonical encoded form of the error
//! (the source of truth on every read) alongside denormalized copies of its
//! fields for backend-side querying.
//!
//! # Key Types
//!
//! - [`ErrorLog`] -- backend-agnostic contract: log, get one, list a page
//! - [`ErrorLogStore`] -- the implementation over any [`ErrorLogBackend`]
//! - [`StoreConfig`] / [`CappedPolicy`] -- container naming and bounds
//! - [`RecordMapper`] / [`PersistedRecord`] -- error to record mapping
//!
//! # Backends
//!
//! - [`MemoryBackend`] -- `HashMap`-based backend for tests and embedding
//! - [`SqliteBackend`] -- durable backend on a SQLite database file
//!
//! # Design Rules
//!
//! 1. Every logged error gets a fresh, unique `ErrorId`.
//! 2. Reads decode the canonical form only; denormalized fields are never
//!    consulted.
//! 3. Containers are bootstrapped once, when the store is constructed.
//! 4. Capped containers evict their oldest inserted records first.
//! 5. All failures are returned to the caller, never silently ignored.

pub mod backend;
pub mod config;
pub mod error;
pub mod record;
pub mod store;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::memory::MemoryBackend;
pub use backend::sqlite::SqliteBackend;
pub use backend::{BackendHandle, Bootstrap, Connect, ContainerInfo, ErrorLogBackend};
pub use config::{
    CappedPolicy, StoreConfig, DEFAULT_CAPPED_MAX_BYTES, DEFAULT_CAPPED_MAX_DOCUMENTS,
    DEFAULT_COLLECTION_NAME, DEFAULT_DATABASE_NAME,
};
pub use error::{StoreError, StoreResult};
pub use record::{PersistedRecord, RecordId, RecordMapper};
pub use store::ErrorLogStore;
pub use traits::{ErrorLog, ErrorLogEntry, ErrorPage, SkippedRecord};
