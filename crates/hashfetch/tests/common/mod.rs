#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use hashfetch::{
    BoxError, ContentHash, HashFetch, HashFetchOptions, LocalTransport, ManualClock, Registry, RegistryEntry,
    StaticRegistry, Transport,
};
use hashfetch_fetch::{BoxStream, Error as FetchError, HttpClient};
use hashfetch_verify::KeccakHasher;
use zip::write::SimpleFileOptions;

pub const START: u64 = 1_700_000_000_000;

/// Serves canned bodies per URL and records every request.
#[derive(Default)]
pub struct FakeHttp {
    bodies:   Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    delay:    Duration,
}

impl FakeHttp {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.into());
    }

    pub fn requests(&self) -> Vec<String> { self.requests.lock().unwrap().clone() }

    pub fn request_count(&self) -> usize { self.requests.lock().unwrap().len() }
}

impl HttpClient for FakeHttp {
    async fn stream(&self, url: &str) -> hashfetch_fetch::Result<BoxStream<'static, hashfetch_fetch::Result<Bytes>>> {
        self.requests.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body = self.bodies.lock().unwrap().get(url).cloned();
        match body {
            Some(body) => {
                let chunks: Vec<hashfetch_fetch::Result<Bytes>> =
                    body.chunks(7).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
                Ok(Box::pin(futures_util::stream::iter(chunks)))
            }
            None => Err(FetchError::Status {
                url:    url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Wraps a [`StaticRegistry`] and counts lookups.
#[derive(Default)]
pub struct CountingRegistry {
    inner: StaticRegistry,
    calls: AtomicUsize,
}

impl CountingRegistry {
    pub fn new(inner: StaticRegistry) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Registry for CountingRegistry {
    async fn entry(&self, hash: &ContentHash) -> Result<RegistryEntry, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.entry(hash).await
    }
}

pub fn hash_of(bytes: &[u8]) -> ContentHash { ContentHash::from_digest(KeccakHasher::digest(bytes)) }

pub fn direct_file(url: &str) -> RegistryEntry {
    RegistryEntry {
        slug:   url.to_string(),
        commit: hashfetch::FILE_MARKER,
        author: [7; 20],
    }
}

pub fn direct_archive(url: &str) -> RegistryEntry {
    RegistryEntry {
        slug:   url.to_string(),
        commit: hashfetch::ARCHIVE_MARKER,
        author: [7; 20],
    }
}

/// Builds an in-memory zip. `None` content means a directory entry.
pub fn zip_bytes(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            Some(bytes) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(bytes).unwrap();
            }
            None => zip.add_directory(*name, options).unwrap(),
        }
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path).unwrap().write_all(bytes).unwrap();
}

pub fn dir_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub struct Harness<T: Transport = LocalTransport<Arc<FakeHttp>>> {
    pub dir:      tempfile::TempDir,
    pub http:     Arc<FakeHttp>,
    pub registry: Arc<CountingRegistry>,
    pub clock:    ManualClock,
    pub engine:   HashFetch<Arc<CountingRegistry>, T>,
}

impl<T: Transport> Harness<T> {
    pub fn root(&self) -> PathBuf { self.dir.path().join("store") }
}

pub fn options(dir: &tempfile::TempDir) -> HashFetchOptions { HashFetchOptions::default().root(dir.path().join("store")) }

pub fn harness(registry: StaticRegistry, http: FakeHttp) -> Harness {
    harness_with(registry, http, |options| options)
}

pub fn harness_with(
    registry: StaticRegistry,
    http: FakeHttp,
    configure: impl FnOnce(HashFetchOptions) -> HashFetchOptions,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let options = configure(options(&dir));
    let http = Arc::new(http);
    let registry = Arc::new(CountingRegistry::new(registry));
    let clock = ManualClock::new(START);

    let transport = LocalTransport::new(Arc::clone(&http)).max_download_size(options.max_download_size);
    let engine = HashFetch::with_clock(options, Arc::clone(&registry), transport, Arc::new(clock.clone()));

    Harness {
        dir,
        http,
        registry,
        clock,
        engine,
    }
}
