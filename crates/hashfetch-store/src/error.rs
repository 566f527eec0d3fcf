use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to {op} '{path}': {source}")]
    Io {
        op:     &'static str,
        path:   PathBuf,
        source: io::Error,
    },

    #[error("failed to encode retry ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
