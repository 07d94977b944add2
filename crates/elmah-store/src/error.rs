/// Errors from error log operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Caller-supplied arguments are out of range (e.g. negative paging).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No record carries the requested error id.
    #[error("error not found: {0}")]
    NotFound(String),

    /// A record could not be mapped to or from its canonical encoded form.
    /// Indicates corruption or a codec version mismatch.
    #[error("cannot map error {error_id}: {reason}")]
    Mapping { error_id: String, reason: String },

    /// The backend rejected or could not complete an insert.
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// The backend could not be reached, bootstrapped, or timed out.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The database or container name cannot be used by the backend.
    #[error("invalid container name {0:?}")]
    InvalidContainerName(String),

    /// Store configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn mapping(error_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Mapping {
            error_id: error_id.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> Self {
        Self::BackendUnavailable(format!("lock poisoned: {e}"))
    }
}

/// Result alias for error log operations.
pub type StoreResult<T> = Result<T, StoreError>;
