//! Content-addressed fetch-and-cache engine.
//!
//! Given a 32-byte content hash, [`HashFetch::fetch`] returns a local path
//! whose bytes are guaranteed to hash to it. The hash is looked up in a
//! [`Registry`], the resulting URL is downloaded with a size ceiling, the
//! bytes are verified, archives are unpacked (collapsing a lone root
//! folder), and the result is cached under `<root>/files/<hash>`. Failed
//! sources are gated by an exponential backoff that survives restarts.
//!
//! ```no_run
//! # async fn demo() -> hashfetch::Result<()> {
//! use hashfetch::{ContentHash, ExpectedKind, HashFetch, HashFetchOptions, ReqwestClient, StaticRegistry};
//!
//! let registry = StaticRegistry::new();
//! let engine = HashFetch::local(HashFetchOptions::default(), registry, ReqwestClient::new());
//! let hash = ContentHash::parse("0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470").expect("valid hash");
//! let path = engine.fetch(&hash, ExpectedKind::File).await?;
//! # let _ = path;
//! # Ok(())
//! # }
//! ```

mod channel;
mod error;
mod fetch;
mod kind;
mod locator;
mod options;
mod registry;
mod transport;

pub use channel::{ChannelTransport, Event, Operation, Request, serve};
pub use error::{Error, ResolutionError, Result};
pub use fetch::HashFetch;
pub use kind::ExpectedKind;
pub use locator::{ARCHIVE_MARKER, FILE_MARKER, Locator, resolve};
pub use options::HashFetchOptions;
pub use registry::{BoxError, Registry, RegistryEntry, StaticRegistry, StaticRegistryError};
pub use transport::{LocalTransport, Transport};

pub use hashfetch_fetch::{DownloadOptions, HttpClient, MAX_DOWNLOAD_SIZE};
#[cfg(feature = "reqwest")]
pub use hashfetch_fetch::ReqwestClient;
pub use hashfetch_store::{ArtifactKind, BackoffPolicy, Clock, ManualClock, RetryLedger, Store, SystemClock};
pub use hashfetch_verify::ContentHash;
