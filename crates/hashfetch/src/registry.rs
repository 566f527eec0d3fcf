//! The registry collaborator: an external `hash -> (slug, commit, author)`
//! lookup, treated as a pure and possibly slow read.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use hashfetch_verify::ContentHash;
use serde::Deserialize;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A raw registry record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub slug:   String,
    pub commit: [u8; 32],
    pub author: [u8; 20],
}

impl RegistryEntry {
    /// The record a lookup returns for a hash nobody registered.
    pub fn empty() -> Self { Self::default() }
}

pub trait Registry: Send + Sync + 'static {
    fn entry(
        &self,
        hash: &ContentHash,
    ) -> impl Future<Output = Result<RegistryEntry, BoxError>> + Send;
}

impl<R: Registry> Registry for Arc<R> {
    fn entry(
        &self,
        hash: &ContentHash,
    ) -> impl Future<Output = Result<RegistryEntry, BoxError>> + Send {
        (**self).entry(hash)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StaticRegistryError {
    #[error("invalid registry document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hash key '{0}'")]
    InvalidHash(String),

    #[error("invalid {field} '{value}': expected {bytes} hex-encoded bytes")]
    InvalidHex {
        field: &'static str,
        value: String,
        bytes: usize,
    },
}

#[derive(Deserialize)]
struct RawEntry {
    slug:   String,
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

/// In-memory registry, loadable from a JSON document of the form
/// `{ "<hash>": { "slug": "...", "commit": "0x...", "author": "0x..." } }`.
///
/// Unknown hashes yield [`RegistryEntry::empty`], as an on-chain lookup
/// would.
#[derive(Clone, Debug, Default)]
pub struct StaticRegistry {
    entries: HashMap<ContentHash, RegistryEntry>,
}

impl StaticRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, hash: ContentHash, entry: RegistryEntry) { self.entries.insert(hash, entry); }

    pub fn with(mut self, hash: ContentHash, entry: RegistryEntry) -> Self {
        self.insert(hash, entry);
        self
    }

    pub fn from_json(document: &str) -> Result<Self, StaticRegistryError> {
        let raw: HashMap<String, RawEntry> = serde_json::from_str(document)?;
        let mut registry = Self::new();

        for (key, entry) in raw {
            let hash =
                ContentHash::parse(&key).map_err(|_| StaticRegistryError::InvalidHash(key.clone()))?;
            let commit = decode_fixed::<32>("commit", entry.commit.as_deref())?;
            let author = decode_fixed::<20>("author", entry.author.as_deref())?;
            registry.insert(hash, RegistryEntry {
                slug: entry.slug,
                commit,
                author,
            });
        }

        Ok(registry)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Registry for StaticRegistry {
    async fn entry(&self, hash: &ContentHash) -> Result<RegistryEntry, BoxError> {
        Ok(self.entries.get(hash).cloned().unwrap_or_default())
    }
}

fn decode_fixed<const N: usize>(
    field: &'static str,
    value: Option<&str>,
) -> Result<[u8; N], StaticRegistryError> {
    let mut out = [0u8; N];
    let Some(value) = value else {
        return Ok(out);
    };
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode_to_slice(digits, &mut out).map_err(|_| StaticRegistryError::InvalidHex {
        field,
        value: value.to_string(),
        bytes: N,
    })?;
    Ok(out)
}
