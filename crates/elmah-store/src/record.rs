//! Persisted record shape and the mapper between it and [`CapturedError`].
//!
//! The field names of [`PersistedRecord`] (PascalCase, `_id` for the
//! store-internal identity) are the wire contract external tooling reads.

use std::fmt;

use chrono::{DateTime, Utc};
use elmah_codec::{CodecError, ErrorCodec, JsonErrorCodec};
use elmah_types::{
    CapturedError, ErrorId, ErrorParam, ExceptionInfo, LogMessageEntry, NameValueCollection,
    MAX_EXCEPTION_DEPTH,
};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Backend-assigned, store-internal record identity.
///
/// Opaque to callers and irrelevant to ordering; the externally-visible
/// handle is the record's `ErrorId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flattened exception level as persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PersistedException {
    pub message: String,
    pub stack_trace: String,
    pub source: String,
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<PersistedException>>,
}

impl From<&ExceptionInfo> for PersistedException {
    /// Copies at most [`MAX_EXCEPTION_DEPTH`] levels. The full chain lives in
    /// the canonical form; this nested copy only serves queries.
    fn from(info: &ExceptionInfo) -> Self {
        // Walk innermost-out so deep chains never recurse.
        let levels: Vec<&ExceptionInfo> = info.chain().take(MAX_EXCEPTION_DEPTH).collect();
        let mut inner: Option<Box<PersistedException>> = None;
        for level in levels.into_iter().rev() {
            inner = Some(Box::new(PersistedException {
                message: level.message.clone(),
                stack_trace: level.stack_trace.clone(),
                source: level.source.clone(),
                type_name: level.type_name.clone(),
                inner_exception: inner,
            }));
        }
        inner.map(|b| *b).unwrap_or_default()
    }
}

impl PersistedException {
    /// Number of levels in the persisted chain.
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |e| e.inner_exception.as_deref()).count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PersistedParam {
    pub key: String,
    pub value: String,
}

impl From<&ErrorParam> for PersistedParam {
    fn from(p: &ErrorParam) -> Self {
        Self {
            key: p.key.clone(),
            value: p.value.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersistedLogMessage {
    pub time_stamp: DateTime<Utc>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<&LogMessageEntry> for PersistedLogMessage {
    fn from(m: &LogMessageEntry) -> Self {
        Self {
            time_stamp: m.time,
            level: m.level.clone(),
            message: m.message.clone(),
            exception: m.exception.clone(),
            scope: m.scope.clone(),
        }
    }
}

/// Storage projection of one logged error.
///
/// `xml_error` holds the canonical encoded form and is the only field read
/// back when reconstructing the error. Every other field is a denormalized
/// copy kept for backend-side querying and indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersistedRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub error_id: String,
    /// Canonical encoded error. The field name is kept for compatibility with
    /// existing ELMAH tooling; the content is whatever the codec emits.
    pub xml_error: String,
    #[serde(default)]
    pub query_string: NameValueCollection,
    #[serde(default)]
    pub server_variables: NameValueCollection,
    #[serde(default)]
    pub form: NameValueCollection,
    #[serde(default)]
    pub cookies: NameValueCollection,
    #[serde(default)]
    pub web_host_html_message: String,
    #[serde(default)]
    pub status_code: i32,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "Type", default)]
    pub type_name: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<PersistedException>,
    #[serde(default)]
    pub params: Vec<PersistedParam>,
    #[serde(default)]
    pub message_log: Vec<PersistedLogMessage>,
}

impl PersistedRecord {
    /// Serialized size in bytes, used to enforce byte-bounded containers.
    pub fn approximate_size(&self) -> StoreResult<u64> {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len() as u64)
            .map_err(|e| StoreError::mapping(&self.error_id, e))
    }

    /// The record as a JSON document (store-internal id excluded).
    pub fn to_document(&self) -> StoreResult<String> {
        let detached = PersistedRecord {
            id: None,
            ..self.clone()
        };
        serde_json::to_string(&detached).map_err(|e| StoreError::mapping(&self.error_id, e))
    }

    /// A record carrying only the canonical form and its ordering key.
    ///
    /// Backends fall back to this when a stored document's denormalized
    /// copy is unreadable; reads never depend on the denormalized fields.
    pub fn canonical_only(error_id: String, xml_error: String, time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            error_id,
            xml_error,
            query_string: NameValueCollection::new(),
            server_variables: NameValueCollection::new(),
            form: NameValueCollection::new(),
            cookies: NameValueCollection::new(),
            web_host_html_message: String::new(),
            status_code: 0,
            time,
            user: String::new(),
            detail: String::new(),
            message: String::new(),
            source: String::new(),
            body: String::new(),
            type_name: String::new(),
            host_name: String::new(),
            application_name: String::new(),
            exception: None,
            params: Vec::new(),
            message_log: Vec::new(),
        }
    }

    /// Parse a JSON document produced by [`PersistedRecord::to_document`].
    pub fn from_document(error_id: &str, document: &str) -> StoreResult<Self> {
        serde_json::from_str(document).map_err(|e| StoreError::mapping(error_id, e))
    }
}

/// Converts captured errors to persisted records and back.
#[derive(Clone, Debug, Default)]
pub struct RecordMapper<C = JsonErrorCodec> {
    codec: C,
}

impl RecordMapper<JsonErrorCodec> {
    /// A mapper using the JSON canonical codec.
    pub fn json() -> Self {
        Self::new(JsonErrorCodec::new())
    }
}

impl<C: ErrorCodec> RecordMapper<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Build the persisted record for `error`, tagged with `id`.
    ///
    /// An error whose canonical form exceeds the codec's size limit cannot be
    /// written and fails with `WriteFailure`; other codec failures are
    /// `Mapping`.
    pub fn to_record(&self, id: &ErrorId, error: &CapturedError) -> StoreResult<PersistedRecord> {
        let error_id = id.to_string();
        let xml_error = self.codec.encode(error).map_err(|e| match e {
            CodecError::TooLarge { .. } => {
                StoreError::WriteFailure(format!("error {error_id}: {e}"))
            }
            other => StoreError::mapping(&error_id, other),
        })?;

        Ok(PersistedRecord {
            id: None,
            error_id,
            xml_error,
            query_string: error.query_string.clone(),
            server_variables: error.server_variables.clone(),
            form: error.form.clone(),
            cookies: error.cookies.clone(),
            web_host_html_message: error.web_host_html_message.clone(),
            status_code: error.status_code,
            time: error.time,
            user: error.user.clone(),
            detail: error.detail.clone(),
            message: error.message.clone(),
            source: error.source.clone(),
            body: error.body.clone(),
            type_name: error.type_name.clone(),
            host_name: error.host_name.clone(),
            application_name: error.application_name.clone(),
            exception: error.exception.as_ref().map(PersistedException::from),
            params: error.params.iter().map(PersistedParam::from).collect(),
            message_log: error.message_log.iter().map(PersistedLogMessage::from).collect(),
        })
    }

    /// Rebuild the error from the record's canonical encoded form.
    ///
    /// The denormalized fields are never consulted.
    pub fn from_record(&self, record: &PersistedRecord) -> StoreResult<CapturedError> {
        self.codec
            .decode(&record.xml_error)
            .map_err(|e| StoreError::mapping(&record.error_id, e))
    }
}
