use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("hash mismatch: expected 0x{expected}, got 0x{actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid content hash '{0}': expected 64 hex characters")]
    InvalidHash(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
