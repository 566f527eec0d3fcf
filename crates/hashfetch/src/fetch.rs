//! The fetch coordinator.
//!
//! One pipeline per hash runs at a time; concurrent callers share it. A
//! pipeline walks: cache check, locator resolution, retry gate, download,
//! verification, placement. Every caller then checks the placed artifact
//! against its own expected kind.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use hashfetch_fetch::HttpClient;
use hashfetch_store::{Clock, RetryLedger, Store, SystemClock};
use hashfetch_verify::{ContentHash, VerifyError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::kind::ExpectedKind;
use crate::locator::{Locator, resolve};
use crate::options::HashFetchOptions;
use crate::registry::Registry;
use crate::transport::{LocalTransport, Transport};

type Pipeline = Shared<BoxFuture<'static, Result<PathBuf>>>;

pub struct HashFetch<R, T> {
    engine: Arc<Engine<R, T>>,
}

impl<R, T> Clone for HashFetch<R, T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

struct Engine<R, T> {
    store:     Store,
    ledger:    RetryLedger,
    registry:  R,
    transport: T,
    ready:     OnceCell<()>,
    in_flight: Mutex<HashMap<ContentHash, Pipeline>>,
}

impl<R: Registry, C: HttpClient + 'static> HashFetch<R, LocalTransport<C>> {
    /// Engine that downloads and extracts in this process.
    pub fn local(options: HashFetchOptions, registry: R, client: C) -> Self {
        let transport = LocalTransport::new(client).max_download_size(options.max_download_size);
        Self::new(options, registry, transport)
    }
}

impl<R: Registry, T: Transport> HashFetch<R, T> {
    pub fn new(options: HashFetchOptions, registry: R, transport: T) -> Self {
        Self::with_clock(options, registry, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(options: HashFetchOptions, registry: R, transport: T, clock: Arc<dyn Clock>) -> Self {
        let store = Store::new(options.root);
        let ledger = RetryLedger::new(store.ledger_path(), options.backoff, clock);
        Self {
            engine: Arc::new(Engine {
                store,
                ledger,
                registry,
                transport,
                ready: OnceCell::new(),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Store { &self.engine.store }

    pub fn ledger(&self) -> &RetryLedger { &self.engine.ledger }

    pub fn registry(&self) -> &R { &self.engine.registry }

    pub fn transport(&self) -> &T { &self.engine.transport }

    /// Prepare the store and load the retry ledger. Runs once; later calls
    /// return immediately. A failed attempt is retried by the next call.
    pub async fn initialize(&self) -> Result<()> {
        let engine = &self.engine;
        engine
            .ready
            .get_or_try_init(|| async {
                engine.store.initialize().await?;
                engine.ledger.load().await?;
                info!(root = %engine.store.root().display(), "content store ready");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    /// Resolve where `hash` would be downloaded from, without fetching it.
    pub async fn resolve(&self, hash: &ContentHash) -> Result<Locator> {
        resolve(&self.engine.registry, hash).await
    }

    /// Materialize `hash` under `files/` and return its canonical path.
    pub async fn fetch(&self, hash: &ContentHash, expected: ExpectedKind) -> Result<PathBuf> {
        self.initialize().await?;

        let pipeline = self.pipeline(hash);
        let mut path = pipeline.clone().await?;
        let mut placed = self.engine.store.lookup(hash).await?;

        if placed.is_none() {
            // A finished pipeline outlived its artifact; start over from the
            // cache check.
            debug!(%hash, "cached artifact was removed, fetching again");
            self.evict(hash, &pipeline);
            path = self.pipeline(hash).await?;
            placed = self.engine.store.lookup(hash).await?;
        }

        match placed {
            Some(found) if expected.accepts(found) => Ok(path),
            Some(found) => Err(Error::KindMismatch {
                hash: hash.clone(),
                expected,
                found,
            }),
            None => Err(Error::Aborted {
                hash:   hash.clone(),
                reason: "artifact disappeared from the store".into(),
            }),
        }
    }

    /// [`fetch`](Self::fetch) for a hex hash, with or without `0x`.
    pub async fn fetch_hex(&self, hash: &str, expected: ExpectedKind) -> Result<PathBuf> {
        let hash = ContentHash::parse(hash).map_err(|_| Error::InvalidHash(hash.to_string()))?;
        self.fetch(&hash, expected).await
    }

    /// Drop the map entry for `hash` if it is still `stale`.
    fn evict(&self, hash: &ContentHash, stale: &Pipeline) {
        let mut in_flight = self.engine.in_flight();
        if in_flight.get(hash).is_some_and(|current| current.ptr_eq(stale)) {
            in_flight.remove(hash);
        }
    }

    /// Join the pipeline already running for `hash`, or start one.
    fn pipeline(&self, hash: &ContentHash) -> Pipeline {
        let mut in_flight = self.engine.in_flight();
        if let Some(pipeline) = in_flight.get(hash) {
            debug!(%hash, "joining in-flight fetch");
            return pipeline.clone();
        }

        // The map lock is held until the entry is inserted, so the task's
        // own eviction can never run first.
        let guard = EvictOnFailure {
            engine: Arc::clone(&self.engine),
            hash:   hash.clone(),
            armed:  true,
        };
        let task = tokio::spawn(async move {
            let mut guard = guard;
            let result = guard.engine.materialize(&guard.hash).await;
            guard.armed = result.is_err();
            result
        });

        let key = hash.clone();
        let pipeline = async move {
            task.await.unwrap_or_else(|e| {
                Err(Error::Aborted {
                    hash:   key,
                    reason: e.to_string(),
                })
            })
        }
        .boxed()
        .shared();

        in_flight.insert(hash.clone(), pipeline.clone());
        pipeline
    }
}

/// Drops the in-flight entry unless the pipeline succeeded, including when
/// the pipeline task panics.
struct EvictOnFailure<R, T> {
    engine: Arc<Engine<R, T>>,
    hash:   ContentHash,
    armed:  bool,
}

impl<R, T> Drop for EvictOnFailure<R, T> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.in_flight().remove(&self.hash);
        }
    }
}

impl<R, T> Engine<R, T> {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<ContentHash, Pipeline>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Registry, T: Transport> Engine<R, T> {
    async fn materialize(&self, hash: &ContentHash) -> Result<PathBuf> {
        let final_path = self.store.file_path(hash);
        if let Some(kind) = self.store.lookup(hash).await? {
            debug!(%hash, ?kind, "cache hit");
            return Ok(final_path);
        }

        let locator = resolve(&self.registry, hash).await?;

        if !self.ledger.can_attempt(hash, &locator.url) {
            let retry_at = self.ledger.next_attempt_at(hash, &locator.url).unwrap_or_default();
            debug!(%hash, url = %locator.url, retry_at, "retry delay not elapsed");
            return Err(Error::RetryBackoff {
                hash: hash.clone(),
                url: locator.url,
                retry_at,
            });
        }

        match self.acquire(hash, &locator, &final_path).await {
            Ok(()) => {
                info!(%hash, url = %locator.url, path = %final_path.display(), "fetched");
                Ok(final_path)
            }
            Err(e) => {
                if e.is_retry_tracked() {
                    self.ledger.register_failed_attempt(hash, &locator.url);
                }
                warn!(%hash, url = %locator.url, error = %e, "fetch failed");
                Err(e)
            }
        }
    }

    async fn acquire(&self, hash: &ContentHash, locator: &Locator, final_path: &Path) -> Result<()> {
        let partial = self.store.partial_path(hash);

        let bytes = self.transport.download(&locator.url, &partial).await?;
        debug!(%hash, bytes, path = %partial.display(), "downloaded");

        if let Err(e) = verify(hash, &partial).await {
            remove_file_quietly(&partial).await;
            return Err(e);
        }

        if locator.is_archive {
            self.place_archive(hash, &partial, final_path).await
        } else {
            match tokio::fs::rename(&partial, final_path).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    remove_file_quietly(&partial).await;
                    Err(Error::io("move", final_path)(e))
                }
            }
        }
    }

    async fn place_archive(&self, hash: &ContentHash, archive: &Path, final_path: &Path) -> Result<()> {
        let extract_dir = self.store.partial_extract_path(hash);
        remove_dir_quietly(&extract_dir).await;

        let result = async {
            self.transport.extract(archive, &extract_dir).await?;
            tokio::fs::remove_file(archive)
                .await
                .map_err(Error::io("remove", archive))?;

            let (from, to) = (extract_dir.clone(), final_path.to_path_buf());
            let placement = tokio::task::spawn_blocking(move || hashfetch_archive::collapse_into(&from, &to))
                .await
                .map_err(|e| Error::Aborted {
                    hash:   hash.clone(),
                    reason: e.to_string(),
                })?
                .map_err(|e| Error::Extraction {
                    archive: archive.to_path_buf(),
                    source:  Arc::new(e),
                })?;
            debug!(%hash, ?placement, "archive placed");
            Ok::<(), Error>(())
        }
        .await;

        if result.is_err() {
            remove_file_quietly(archive).await;
            remove_dir_quietly(&extract_dir).await;
        }
        result
    }
}

async fn verify(hash: &ContentHash, path: &Path) -> Result<()> {
    let (expected, target) = (hash.clone(), path.to_path_buf());
    let outcome = tokio::task::spawn_blocking(move || hashfetch_verify::verify_file(&expected, &target))
        .await
        .map_err(|e| Error::Aborted {
            hash:   hash.clone(),
            reason: e.to_string(),
        })?;

    match outcome {
        Ok(()) => {
            debug!(%hash, "hash verified");
            Ok(())
        }
        Err(VerifyError::HashMismatch { actual, .. }) => Err(Error::HashMismatch {
            expected: hash.clone(),
            actual,
        }),
        Err(VerifyError::Io(source)) => Err(Error::io("hash", path)(source)),
        Err(other) => Err(Error::io("hash", path)(io::Error::other(other))),
    }
}

async fn remove_file_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove partial file");
    }
}

async fn remove_dir_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove partial directory");
    }
}
