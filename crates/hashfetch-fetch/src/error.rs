//! Error types for hashfetch-fetch.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("download aborted: exceeded maximum size of {limit} bytes")]
    SizeExceeded { limit: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
