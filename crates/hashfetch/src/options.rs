use std::path::PathBuf;

use hashfetch_fetch::MAX_DOWNLOAD_SIZE;
use hashfetch_store::BackoffPolicy;
use serde::{Deserialize, Serialize};

const DEFAULT_DIR: &str = ".hashfetch";

/// Engine configuration. Every field has a default, so an empty TOML table
/// is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashFetchOptions {
    /// Store root holding `files/`, the scratch directories and the ledger.
    pub root:              PathBuf,
    /// Byte ceiling for a single download.
    pub max_download_size: u64,
    pub backoff:           BackoffPolicy,
}

impl Default for HashFetchOptions {
    fn default() -> Self {
        Self {
            root:              default_root(),
            max_download_size: MAX_DOWNLOAD_SIZE,
            backoff:           BackoffPolicy::default(),
        }
    }
}

impl HashFetchOptions {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn max_download_size(mut self, bytes: u64) -> Self {
        self.max_download_size = bytes;
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

fn default_root() -> PathBuf {
    home::home_dir()
        .map(|home| home.join(DEFAULT_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR))
}
