//! Error types for the fetch pipeline.
//!
//! [`Error`] is `Clone` so that one pipeline failure can be handed to every
//! caller waiting on it; foreign sources are kept behind `Arc`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use hashfetch_store::ArtifactKind;
use hashfetch_verify::ContentHash;

use crate::kind::ExpectedKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("no registry entry found")]
    NotFound,

    #[error("registry entry has an empty slug")]
    EmptySlug,

    #[error("registry URL '{0}' isn't HTTP/HTTPS")]
    NotHttp(String),

    #[error("registry lookup failed: {0}")]
    Registry(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid content hash '{0}'")]
    InvalidHash(String),

    #[error("cannot resolve {hash}: {reason}")]
    Resolution {
        hash:   ContentHash,
        reason: ResolutionError,
    },

    #[error("previous attempt at downloading {hash} from {url} failed; retry delay not yet elapsed (next attempt after {retry_at} ms)")]
    RetryBackoff {
        hash:     ContentHash,
        url:      String,
        retry_at: u64,
    },

    #[error("download of {url} aborted: exceeded maximum size of {limit} bytes")]
    SizeExceeded { url: String, limit: u64 },

    #[error("hashes don't match: expected 0x{expected}, got 0x{actual}")]
    HashMismatch {
        expected: ContentHash,
        actual:   String,
    },

    #[error("download of {url} failed: {source}")]
    Download {
        url:    String,
        source: Arc<hashfetch_fetch::Error>,
    },

    #[error("extraction of '{archive}' failed: {source}")]
    Extraction {
        archive: PathBuf,
        source:  Arc<hashfetch_archive::Error>,
    },

    #[error("expected {hash} to be a {expected}; got a {}", found_label(.found))]
    KindMismatch {
        hash:     ContentHash,
        expected: ExpectedKind,
        found:    ArtifactKind,
    },

    #[error("content store error: {0}")]
    Store(Arc<hashfetch_store::Error>),

    #[error("failed to {op} '{path}': {source}")]
    Io {
        op:     &'static str,
        path:   PathBuf,
        source: Arc<io::Error>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("fetch pipeline for {hash} aborted: {reason}")]
    Aborted { hash: ContentHash, reason: String },
}

fn found_label(found: &ArtifactKind) -> &'static str {
    match found {
        ArtifactKind::File => "file",
        ArtifactKind::Directory => "folder (dapp)",
    }
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            op,
            path,
            source: Arc::new(source),
        }
    }

    /// Whether this failure is recorded in the retry ledger.
    ///
    /// Only failures that happen after a URL passed the backoff gate count:
    /// the download itself, verification, and placement.
    pub fn is_retry_tracked(&self) -> bool {
        matches!(
            self,
            Error::SizeExceeded { .. }
                | Error::HashMismatch { .. }
                | Error::Download { .. }
                | Error::Extraction { .. }
                | Error::Io { .. }
                | Error::Transport(_)
        )
    }
}

impl From<hashfetch_store::Error> for Error {
    fn from(e: hashfetch_store::Error) -> Self { Error::Store(Arc::new(e)) }
}

pub type Result<T> = std::result::Result<T, Error>;
