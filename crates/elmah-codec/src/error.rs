use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encoded error is empty")]
    Empty,

    #[error("encoded error too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("codec version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub type CodecResult<T> = Result<T, CodecError>;
