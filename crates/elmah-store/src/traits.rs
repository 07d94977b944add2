use elmah_types::{CapturedError, ErrorId};

use crate::error::{StoreError, StoreResult};

/// A decoded error read back from a log.
///
/// Built on every read and never persisted. Carries the name of the log it
/// came from rather than a borrow of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub log_name: String,
    pub id: String,
    pub error: CapturedError,
}

impl ErrorLogEntry {
    pub fn new(log_name: impl Into<String>, id: impl Into<String>, error: CapturedError) -> Self {
        Self {
            log_name: log_name.into(),
            id: id.into(),
            error,
        }
    }
}

/// A record in a listing page whose canonical form could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    pub error_id: String,
    pub reason: String,
}

/// One page of a listing, most recent error first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorPage {
    pub entries: Vec<ErrorLogEntry>,
    /// Records in the container at query time, saturating at `usize::MAX`.
    pub total_count: usize,
    /// Records in the page window that could not be decoded.
    pub skipped: Vec<SkippedRecord>,
}

impl ErrorPage {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Backend-agnostic error log.
///
/// All implementations must satisfy these invariants:
/// - Every logged error gets a fresh, unique `ErrorId`.
/// - Reads decode from the canonical encoded form only.
/// - Listings are ordered by descending error time. They are not a stable
///   cursor: a write between two calls may shift the page windows.
/// - Failures are returned to the caller, never logged and dropped.
pub trait ErrorLog: Send + Sync {
    /// Human-readable name of this log implementation.
    fn name(&self) -> &str;

    /// Log an error under a freshly generated identifier and return it.
    ///
    /// On failure no identifier is returned and the error is lost; there is
    /// no buffering or retry.
    fn log(&self, error: &CapturedError) -> StoreResult<ErrorId> {
        let id = ErrorId::new();
        self.log_with_id(id, error)?;
        Ok(id)
    }

    /// Log an error under a caller-chosen identifier.
    fn log_with_id(&self, id: ErrorId, error: &CapturedError) -> StoreResult<()>;

    /// Read one error by identifier.
    ///
    /// Returns `NotFound` if no record carries `id`, and `Mapping` if the
    /// record exists but cannot be decoded.
    fn get_error(&self, id: &str) -> StoreResult<ErrorLogEntry>;

    /// Read a page of errors, most recent first.
    ///
    /// Negative `offset` or `page_size` is rejected with `InvalidArgument`.
    /// An offset past the end yields an empty page.
    fn get_errors(&self, offset: i64, page_size: i64) -> StoreResult<ErrorPage>;
}

/// Validate paging arguments and convert them to `(skip, limit)`.
pub fn page_window(offset: i64, page_size: i64) -> StoreResult<(usize, usize)> {
    if offset < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "offset must be non-negative, got {offset}"
        )));
    }
    if page_size < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "page size must be non-negative, got {page_size}"
        )));
    }
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(page_size).unwrap_or(usize::MAX);
    Ok((skip, limit))
}

/// Convert a backend count to `usize`, saturating instead of overflowing.
pub fn saturating_count(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}
