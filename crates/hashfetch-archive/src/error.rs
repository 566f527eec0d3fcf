use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("zip-slip attack detected: entry '{entry}' resolves outside the extract directory")]
    ZipSlip { entry: PathBuf },

    #[error("entry path is not valid")]
    InvalidPath,

    #[error("archive is corrupted: {0}")]
    Corrupted(String),

    #[error("extract directory '{0}' already has content")]
    NotEmpty(PathBuf),

    #[error("failed to {op} '{path}': {source}")]
    Fs {
        op:     &'static str,
        path:   PathBuf,
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn fs(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Fs { op, path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
