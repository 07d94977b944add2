use std::sync::Arc;

use elmah_codec::{ErrorCodec, JsonErrorCodec};
use elmah_types::{CapturedError, ErrorId};
use tracing::{debug, info, warn};

use crate::backend::{validate_name, BackendHandle, Bootstrap, Connect, ContainerInfo, ErrorLogBackend};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::RecordMapper;
use crate::traits::{page_window, saturating_count, ErrorLog, ErrorLogEntry, ErrorPage, SkippedRecord};

/// Error log persisted in a container of an [`ErrorLogBackend`].
///
/// Construction bootstraps the container, so a store that exists is ready
/// for use. Dropping it releases an owned backend; a shared one is left to
/// its other holders.
pub struct ErrorLogStore<B, C = JsonErrorCodec> {
    backend: BackendHandle<B>,
    mapper: RecordMapper<C>,
    config: StoreConfig,
    database: String,
    collection: String,
    name: String,
}

impl<B: ErrorLogBackend> ErrorLogStore<B, JsonErrorCodec> {
    /// Open a store over `backend` using the JSON canonical codec.
    pub fn open(config: StoreConfig, backend: BackendHandle<B>) -> StoreResult<Self> {
        Self::open_with_codec(config, backend, JsonErrorCodec::new())
    }

    /// Open a store over a client shared with the host application.
    pub fn with_client(client: Arc<B>, config: StoreConfig) -> StoreResult<Self> {
        Self::open(config, BackendHandle::Shared(client))
    }
}

impl<B: ErrorLogBackend + Connect> ErrorLogStore<B, JsonErrorCodec> {
    /// Open a store that owns a client built from the configured
    /// connection string.
    pub fn connect(config: StoreConfig) -> StoreResult<Self> {
        let connection_string = config
            .connection_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                StoreError::BackendUnavailable("no connection string configured".into())
            })?;
        let backend = B::connect(connection_string)?;
        Self::open(config, BackendHandle::Owned(backend))
    }

    /// Open from configuration, preferring a supplied client over the
    /// connection string.
    pub fn from_config(config: StoreConfig, client: Option<Arc<B>>) -> StoreResult<Self> {
        match client {
            Some(client) => Self::with_client(client, config),
            None => Self::connect(config),
        }
    }
}

impl<B: ErrorLogBackend, C: ErrorCodec> ErrorLogStore<B, C> {
    /// Open a store with a custom canonical codec.
    pub fn open_with_codec(
        config: StoreConfig,
        backend: BackendHandle<B>,
        codec: C,
    ) -> StoreResult<Self> {
        let database = config.effective_database_name().to_string();
        let collection = config.effective_collection_name().to_string();
        validate_name(&database)?;
        validate_name(&collection)?;

        match backend.ensure_container(&database, &collection, &config.capped) {
            Ok(Bootstrap::Created) => info!(
                backend = backend.kind(),
                database = %database,
                container = %collection,
                capped = config.capped.enabled,
                "created error log container"
            ),
            Ok(Bootstrap::Existing) => debug!(
                database = %database,
                container = %collection,
                "error log container already exists"
            ),
            Err(e @ (StoreError::InvalidContainerName(_) | StoreError::BackendUnavailable(_))) => {
                return Err(e)
            }
            Err(other) => {
                return Err(StoreError::BackendUnavailable(format!(
                    "bootstrap of {database}.{collection} failed: {other}"
                )))
            }
        }

        let name = format!("{} Error Log", backend.kind());
        Ok(Self {
            backend,
            mapper: RecordMapper::new(codec),
            config,
            database,
            collection,
            name,
        })
    }

    // ---- Accessors ----

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.config.connection_string.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the backend client was opened by (and is owned by) this store.
    pub fn owns_backend(&self) -> bool {
        self.backend.is_owned()
    }

    /// Physical properties of the underlying container.
    pub fn container_info(&self) -> StoreResult<ContainerInfo> {
        self.backend
            .container_info(&self.database, &self.collection)?
            .ok_or_else(|| {
                StoreError::BackendUnavailable(format!(
                    "container {}.{} disappeared",
                    self.database, self.collection
                ))
            })
    }
}

impl<B: ErrorLogBackend, C: ErrorCodec> ErrorLog for ErrorLogStore<B, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn log_with_id(&self, id: ErrorId, error: &CapturedError) -> StoreResult<()> {
        let record = self.mapper.to_record(&id, error)?;
        let record_id = self
            .backend
            .insert(&self.database, &self.collection, record)?;
        debug!(error_id = %id, record_id = %record_id, "error logged");
        Ok(())
    }

    fn get_error(&self, id: &str) -> StoreResult<ErrorLogEntry> {
        let record = self
            .backend
            .find_by_error_id(&self.database, &self.collection, id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let error = self.mapper.from_record(&record)?;
        Ok(ErrorLogEntry::new(&self.name, record.error_id, error))
    }

    fn get_errors(&self, offset: i64, page_size: i64) -> StoreResult<ErrorPage> {
        let (skip, limit) = page_window(offset, page_size)?;
        let total_count = saturating_count(self.backend.count(&self.database, &self.collection)?);

        let records = if limit == 0 {
            Vec::new()
        } else {
            self.backend
                .find_page(&self.database, &self.collection, skip, limit)?
        };

        let mut page = ErrorPage {
            entries: Vec::with_capacity(records.len()),
            total_count,
            skipped: Vec::new(),
        };
        for record in records {
            match self.mapper.from_record(&record) {
                Ok(error) => page
                    .entries
                    .push(ErrorLogEntry::new(&self.name, record.error_id, error)),
                Err(e) => {
                    warn!(error_id = %record.error_id, error = %e, "skipping undecodable error record");
                    page.skipped.push(SkippedRecord {
                        error_id: record.error_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(page)
    }
}

impl<B, C> std::fmt::Debug for ErrorLogStore<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLogStore")
            .field("name", &self.name)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("owned", &self.backend.is_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::config::CappedPolicy;
    use crate::record::PersistedRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn store() -> ErrorLogStore<MemoryBackend> {
        ErrorLogStore::with_client(Arc::new(MemoryBackend::new()), StoreConfig::default()).unwrap()
    }

    fn error_at(secs: i64) -> CapturedError {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs);
        CapturedError::at(format!("t{secs}"), time)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn defaults_name_the_container() {
        let store = store();
        assert_eq!(store.collection_name(), "elmahcore_collection");
        assert_eq!(store.database_name(), "elmah");
        assert_eq!(store.connection_string(), None);
        assert_eq!(store.name(), "In-Memory Error Log");
        assert!(!store.owns_backend());
    }

    #[test]
    fn blank_collection_name_falls_back_to_default() {
        let config = StoreConfig::default().with_collection_name("   ");
        let store = ErrorLogStore::with_client(Arc::new(MemoryBackend::new()), config).unwrap();
        assert_eq!(store.collection_name(), "elmahcore_collection");
    }

    #[test]
    fn invalid_collection_name_is_rejected() {
        let config = StoreConfig::default().with_collection_name("bad name");
        let err = ErrorLogStore::with_client(Arc::new(MemoryBackend::new()), config).unwrap_err();
        assert!(matches!(err, StoreError::InvalidContainerName(_)));
    }

    #[test]
    fn connect_owns_backend() {
        let config = StoreConfig::default().with_connection_string("memory://local");
        let store = ErrorLogStore::<MemoryBackend>::connect(config).unwrap();
        assert!(store.owns_backend());
        assert_eq!(store.connection_string(), Some("memory://local"));
    }

    #[test]
    fn connect_without_connection_string_is_unavailable() {
        let err = ErrorLogStore::<MemoryBackend>::connect(StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
    }

    #[test]
    fn connect_with_bad_connection_string_is_unavailable() {
        let config = StoreConfig::default().with_connection_string("postgres://nowhere");
        let err = ErrorLogStore::<MemoryBackend>::connect(config).unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
    }

    #[test]
    fn from_config_prefers_supplied_client() {
        let client = Arc::new(MemoryBackend::new());
        let config = StoreConfig::default().with_connection_string("ignored://");
        let store = ErrorLogStore::from_config(config, Some(Arc::clone(&client))).unwrap();
        assert!(!store.owns_backend());
        assert_eq!(client.container_names("elmah").unwrap(), ["elmahcore_collection"]);
    }

    #[test]
    fn capped_config_creates_capped_container() {
        let config = StoreConfig::default().with_capped(CappedPolicy::capped(5000, None));
        let store = ErrorLogStore::with_client(Arc::new(MemoryBackend::new()), config).unwrap();
        let info = store.container_info().unwrap();
        assert!(info.capped);
        assert_eq!(info.max_bytes, Some(5000));
        assert_eq!(info.max_documents, Some(10_000));
    }

    // -----------------------------------------------------------------------
    // Logging and reads
    // -----------------------------------------------------------------------

    #[test]
    fn log_then_get_error() {
        let store = store();
        let error = error_at(1).with_type_name("NullReference").with_status_code(500);
        let id = store.log(&error).unwrap();
        let entry = store.get_error(&id.to_string()).unwrap();
        assert_eq!(entry.id, id.to_string());
        assert_eq!(entry.log_name, store.name());
        assert_eq!(entry.error, error);
    }

    #[test]
    fn log_with_id_uses_given_id() {
        let store = store();
        let id = ErrorId::new();
        store.log_with_id(id, &error_at(1)).unwrap();
        assert_eq!(store.get_error(&id.to_string()).unwrap().id, id.to_string());
    }

    #[test]
    fn logging_same_id_twice_is_write_failure() {
        let store = store();
        let id = ErrorId::new();
        store.log_with_id(id, &error_at(1)).unwrap();
        let err = store.log_with_id(id, &error_at(2)).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure(_)));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = store();
        let err = store.get_error("nonexistent-id").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "nonexistent-id"));
    }

    #[test]
    fn get_errors_pages_most_recent_first() {
        let store = store();
        for secs in 1..=10 {
            store.log(&error_at(secs)).unwrap();
        }
        let first = store.get_errors(0, 5).unwrap();
        assert_eq!(first.total_count, 10);
        let messages: Vec<_> = first.entries.iter().map(|e| e.error.message.as_str()).collect();
        assert_eq!(messages, ["t10", "t9", "t8", "t7", "t6"]);

        let second = store.get_errors(5, 5).unwrap();
        let messages: Vec<_> = second.entries.iter().map(|e| e.error.message.as_str()).collect();
        assert_eq!(messages, ["t5", "t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn offset_past_end_is_empty_page() {
        let store = store();
        store.log(&error_at(1)).unwrap();
        let page = store.get_errors(10, 5).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn zero_page_size_reports_total() {
        let store = store();
        store.log(&error_at(1)).unwrap();
        store.log(&error_at(2)).unwrap();
        let page = store.get_errors(0, 0).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn negative_arguments_are_rejected() {
        let store = store();
        assert!(matches!(store.get_errors(-1, 5), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(store.get_errors(0, -5), Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn undecodable_record_is_skipped_and_reported() {
        let store = store();
        store.log(&error_at(1)).unwrap();
        let bad = PersistedRecord::canonical_only(
            "corrupt-1".to_string(),
            "not a canonical error".to_string(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap(),
        );
        store
            .backend()
            .insert(store.database_name(), store.collection_name(), bad)
            .unwrap();

        let page = store.get_errors(0, 10).unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page.skipped.len(), 1);
        assert_eq!(page.skipped[0].error_id, "corrupt-1");

        let err = store.get_error("corrupt-1").unwrap_err();
        assert!(matches!(err, StoreError::Mapping { ref error_id, .. } if error_id == "corrupt-1"));
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", store());
        assert!(debug.contains("ErrorLogStore"));
        assert!(debug.contains("elmahcore_collection"));
    }
}
