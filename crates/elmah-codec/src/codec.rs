use elmah_types::CapturedError;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Version tag written into every encoded error.
pub const CODEC_VERSION: u32 = 1;

/// Maximum size of a single encoded error (16 MiB).
pub const MAX_ENCODED_SIZE: usize = 16 * 1024 * 1024;

/// Canonical text codec for captured errors.
///
/// `decode(encode(e))` must reproduce `e` exactly, field for field. Error
/// logs store the encoded text opaquely and rebuild errors from it on read.
pub trait ErrorCodec: Send + Sync {
    /// Encode an error to its canonical text form.
    fn encode(&self, error: &CapturedError) -> CodecResult<String>;

    /// Decode the canonical text form back into an error.
    fn decode(&self, text: &str) -> CodecResult<CapturedError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    error: &'a CapturedError,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    error: CapturedError,
}

/// JSON implementation of [`ErrorCodec`].
///
/// Format: `{"version":1,"error":{...}}`. Timestamps are RFC 3339 with full
/// sub-second precision.
#[derive(Clone, Debug, Default)]
pub struct JsonErrorCodec {
    pretty: bool,
}

impl JsonErrorCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec that emits indented JSON (useful for inspection).
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl ErrorCodec for JsonErrorCodec {
    fn encode(&self, error: &CapturedError) -> CodecResult<String> {
        let envelope = EnvelopeRef {
            version: CODEC_VERSION,
            error,
        };
        let text = if self.pretty {
            serde_json::to_string_pretty(&envelope)
        } else {
            serde_json::to_string(&envelope)
        }
        .map_err(|e| CodecError::Encode(e.to_string()))?;

        if text.len() > MAX_ENCODED_SIZE {
            return Err(CodecError::TooLarge {
                size: text.len(),
                max: MAX_ENCODED_SIZE,
            });
        }
        Ok(text)
    }

    fn decode(&self, text: &str) -> CodecResult<CapturedError> {
        if text.trim().is_empty() {
            return Err(CodecError::Empty);
        }
        if text.len() > MAX_ENCODED_SIZE {
            return Err(CodecError::TooLarge {
                size: text.len(),
                max: MAX_ENCODED_SIZE,
            });
        }
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))?;
        if envelope.version != CODEC_VERSION {
            return Err(CodecError::VersionMismatch {
                expected: CODEC_VERSION,
                found: envelope.version,
            });
        }
        Ok(envelope.error)
    }
}
