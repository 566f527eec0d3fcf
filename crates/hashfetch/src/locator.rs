//! Turning a registry record into a download location.

use hashfetch_verify::ContentHash;
use tracing::debug;

use crate::error::{Error, ResolutionError, Result};
use crate::registry::{Registry, RegistryEntry};

/// Commit marker meaning "the slug is a direct URL to a file".
pub const FILE_MARKER: [u8; 32] = [0; 32];

/// Commit marker meaning "the slug is a direct URL to an archive".
pub const ARCHIVE_MARKER: [u8; 32] = {
    let mut marker = [0u8; 32];
    marker[31] = 1;
    marker
};

const GITHUB_ARCHIVE_BASE: &str = "https://codeload.github.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    pub url:        String,
    pub is_archive: bool,
}

impl Locator {
    pub fn from_entry(entry: &RegistryEntry) -> std::result::Result<Self, ResolutionError> {
        if entry.slug.is_empty() {
            return Err(if entry.commit == FILE_MARKER && entry.author == [0; 20] {
                ResolutionError::NotFound
            } else {
                ResolutionError::EmptySlug
            });
        }

        match entry.commit {
            FILE_MARKER => Ok(Self {
                url:        require_http(&entry.slug)?,
                is_archive: false,
            }),
            ARCHIVE_MARKER => Ok(Self {
                url:        require_http(&entry.slug)?,
                is_archive: true,
            }),
            commit => Ok(Self {
                url:        format!(
                    "{GITHUB_ARCHIVE_BASE}/{}/zip/{}",
                    entry.slug,
                    hex::encode(commit)
                ),
                is_archive: true,
            }),
        }
    }
}

fn require_http(slug: &str) -> std::result::Result<String, ResolutionError> {
    let lower = slug.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(slug.to_string())
    } else {
        Err(ResolutionError::NotHttp(slug.to_string()))
    }
}

/// Look `hash` up in the registry and derive its [`Locator`].
pub async fn resolve<R: Registry>(registry: &R, hash: &ContentHash) -> Result<Locator> {
    let resolution_error = |reason| Error::Resolution {
        hash: hash.clone(),
        reason,
    };

    let entry = registry
        .entry(hash)
        .await
        .map_err(|e| resolution_error(ResolutionError::Registry(e.to_string())))?;
    let locator = Locator::from_entry(&entry).map_err(resolution_error)?;

    debug!(%hash, url = %locator.url, is_archive = locator.is_archive, "resolved locator");
    Ok(locator)
}
