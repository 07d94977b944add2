//! Canonical encoding for ELMAH captured errors.
//!
//! The canonical encoded form is the single textual representation an error
//! log treats as the source of truth when reading an error back. Stores hold
//! it verbatim and never interpret it; they only call an [`ErrorCodec`].

pub mod codec;
pub mod error;

pub use codec::{ErrorCodec, JsonErrorCodec, CODEC_VERSION, MAX_ENCODED_SIZE};
pub use error::{CodecError, CodecResult};
