use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::NameValueCollection;
use crate::exception::ExceptionInfo;

/// A custom key/value parameter attached to an error by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorParam {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl ErrorParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One entry of the log messages emitted while the failing request ran.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessageEntry {
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl LogMessageEntry {
    pub fn new(time: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            time,
            level: None,
            message: Some(message.into()),
            exception: None,
            scope: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Snapshot of one failure event, captured by the host application.
///
/// A `CapturedError` has no identity of its own; an identifier is assigned
/// when it is logged. It is built once at capture time (via the `with_*`
/// methods) and is never mutated by an error log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    pub message: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub detail: String,
    /// Request body, when the host captured it.
    #[serde(default)]
    pub body: String,
    /// Diagnostic page rendered by the web host.
    #[serde(default)]
    pub web_host_html_message: String,
    #[serde(default)]
    pub status_code: i32,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default)]
    pub params: Vec<ErrorParam>,
    #[serde(default)]
    pub message_log: Vec<LogMessageEntry>,
    #[serde(default)]
    pub query_string: NameValueCollection,
    #[serde(default)]
    pub server_variables: NameValueCollection,
    #[serde(default)]
    pub form: NameValueCollection,
    #[serde(default)]
    pub cookies: NameValueCollection,
}

impl CapturedError {
    /// Create an error with the given message, stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, Utc::now())
    }

    /// Create an error with the given message and timestamp.
    pub fn at(message: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            type_name: String::new(),
            source: String::new(),
            detail: String::new(),
            body: String::new(),
            web_host_html_message: String::new(),
            status_code: 0,
            time,
            user: String::new(),
            application_name: String::new(),
            host_name: String::new(),
            exception: None,
            params: Vec::new(),
            message_log: Vec::new(),
            query_string: NameValueCollection::new(),
            server_variables: NameValueCollection::new(),
            form: NameValueCollection::new(),
            cookies: NameValueCollection::new(),
        }
    }

    /// Capture a live error: message, type, and the full source chain.
    ///
    /// The type name is the Rust type of the outermost error.
    pub fn from_std_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let exception = ExceptionInfo::from_std_error(err)
            .with_type_name(std::any::type_name::<E>());
        let mut captured = Self::new(err.to_string()).with_type_name(std::any::type_name::<E>());
        captured.detail = exception
            .chain()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n ---> ");
        captured.exception = Some(exception);
        captured
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_web_host_html_message(mut self, html: impl Into<String>) -> Self {
        self.web_host_html_message = html.into();
        self
    }

    pub fn with_status_code(mut self, status_code: i32) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn with_host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = name.into();
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(ErrorParam::new(key, value));
        self
    }

    pub fn with_log_message(mut self, entry: LogMessageEntry) -> Self {
        self.message_log.push(entry);
        self
    }

    pub fn with_query_string(mut self, query_string: NameValueCollection) -> Self {
        self.query_string = query_string;
        self
    }

    pub fn with_server_variables(mut self, server_variables: NameValueCollection) -> Self {
        self.server_variables = server_variables;
        self
    }

    pub fn with_form(mut self, form: NameValueCollection) -> Self {
        self.form = form;
        self
    }

    pub fn with_cookies(mut self, cookies: NameValueCollection) -> Self {
        self.cookies = cookies;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> CapturedError {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        CapturedError::at("Object reference not set", time)
            .with_type_name("NullReference")
            .with_status_code(500)
            .with_host_name("web-01")
            .with_param("tenant", "acme")
            .with_log_message(LogMessageEntry::new(time, "handling request").with_level("Info"))
            .with_query_string([("id", "7"), ("id", "8")].into_iter().collect())
            .with_exception(ExceptionInfo::new("outer").with_inner(ExceptionInfo::new("inner")))
    }

    #[test]
    fn builder_sets_fields() {
        let e = sample();
        assert_eq!(e.type_name, "NullReference");
        assert_eq!(e.status_code, 500);
        assert_eq!(e.params, vec![ErrorParam::new("tenant", "acme")]);
        assert_eq!(e.message_log.len(), 1);
        assert_eq!(e.query_string.get_values("id").unwrap(), ["7", "8"]);
        assert_eq!(e.exception.as_ref().unwrap().depth(), 2);
        assert!(e.form.is_empty());
        assert!(e.cookies.is_empty());
    }

    #[test]
    fn from_std_error_captures_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        let e = CapturedError::from_std_error(&io);
        assert_eq!(e.message, "config missing");
        assert!(e.type_name.contains("io"));
        let exception = e.exception.unwrap();
        assert_eq!(exception.message, "config missing");
        assert_eq!(exception.type_name, e.type_name);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"message":"m","time":"2024-03-01T12:30:00Z"}"#;
        let e: CapturedError = serde_json::from_str(json).unwrap();
        assert_eq!(e.message, "m");
        assert_eq!(e.status_code, 0);
        assert!(e.exception.is_none());
        assert!(e.server_variables.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let e = sample();
        let json = serde_json::to_string(&e).unwrap();
        let back: CapturedError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
