use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Upper bound on the depth captured by [`ExceptionInfo::from_std_error`].
pub const MAX_EXCEPTION_DEPTH: usize = 64;

/// Flattened exception chain, outermost first.
///
/// Replaces a live error object graph with a finite, acyclic structure
/// captured once at failure time. Each level keeps the diagnostic fields and
/// owns its inner exception, so a chain always terminates.
///
/// Serializes as a flat array of levels, outermost first, so chains of any
/// depth stay within a decoder's nesting limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub message: String,
    pub stack_trace: String,
    pub source: String,
    pub type_name: String,
    pub inner: Option<Box<ExceptionInfo>>,
}

#[derive(Serialize)]
struct LevelRef<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    stack_trace: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    source: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    type_name: &'a str,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Deserialize)]
struct Level {
    message: String,
    #[serde(default)]
    stack_trace: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    type_name: String,
}

impl Serialize for ExceptionInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.chain().map(|e| LevelRef {
            message: &e.message,
            stack_trace: &e.stack_trace,
            source: &e.source,
            type_name: &e.type_name,
        }))
    }
}

impl<'de> Deserialize<'de> for ExceptionInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let levels = Vec::<Level>::deserialize(deserializer)?;
        ExceptionInfo::from_levels(levels.into_iter().map(|l| ExceptionInfo {
            message: l.message,
            stack_trace: l.stack_trace,
            source: l.source,
            type_name: l.type_name,
            inner: None,
        }))
        .ok_or_else(|| D::Error::custom("exception chain has no levels"))
    }
}

impl ExceptionInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_inner(mut self, inner: ExceptionInfo) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Capture a live `std::error::Error` and its `source()` chain.
    ///
    /// The chain is truncated at [`MAX_EXCEPTION_DEPTH`] levels.
    pub fn from_std_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut levels = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            if levels.len() == MAX_EXCEPTION_DEPTH {
                break;
            }
            levels.push(ExceptionInfo::new(e.to_string()));
            current = e.source();
        }
        Self::from_levels(levels).unwrap_or_default()
    }

    /// Link single levels, outermost first, into a chain.
    ///
    /// Any `inner` already set on a level is replaced. Returns `None` when
    /// `levels` is empty.
    pub fn from_levels(levels: impl IntoIterator<Item = ExceptionInfo>) -> Option<Self> {
        let mut levels: Vec<ExceptionInfo> = levels.into_iter().collect();
        // Rebuild innermost-out so each level owns the next.
        let mut chain: Option<ExceptionInfo> = None;
        while let Some(mut level) = levels.pop() {
            level.inner = chain.map(Box::new);
            chain = Some(level);
        }
        chain
    }

    /// Number of levels in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Iterate levels from the outermost exception inwards.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionInfo> {
        std::iter::successors(Some(self), |e| e.inner.as_deref())
    }

    /// The innermost exception of the chain.
    pub fn root_cause(&self) -> &ExceptionInfo {
        self.chain().last().unwrap_or(self)
    }
}
