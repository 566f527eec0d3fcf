//! Download and extract capabilities the pipeline depends on.
//!
//! The pipeline only ever asks for `download(url, path)` and
//! `extract(archive, dir)`. [`LocalTransport`] does both in-process;
//! [`ChannelTransport`](crate::ChannelTransport) forwards them to a
//! worker that may hold privileges the caller lacks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashfetch_fetch::{DownloadOptions, Downloader, HttpClient};

use crate::error::{Error, Result};

pub trait Transport: Send + Sync + 'static {
    /// Stream `url` into `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> impl Future<Output = Result<u64>> + Send;

    /// Unpack `archive` into `directory`, which must be absent or empty.
    fn extract(&self, archive: &Path, directory: &Path) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn download(&self, url: &str, destination: &Path) -> impl Future<Output = Result<u64>> + Send {
        (**self).download(url, destination)
    }

    fn extract(&self, archive: &Path, directory: &Path) -> impl Future<Output = Result<()>> + Send {
        (**self).extract(archive, directory)
    }
}

pub struct LocalTransport<C: HttpClient> {
    downloader: Downloader<C>,
}

impl<C: HttpClient + 'static> LocalTransport<C> {
    pub fn new(client: C) -> Self {
        Self {
            downloader: Downloader::new(client),
        }
    }

    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.downloader = self.downloader.with_options(options);
        self
    }

    pub fn max_download_size(self, max_bytes: u64) -> Self {
        let options = self.downloader.options().max_bytes(max_bytes);
        self.with_options(options)
    }
}

impl<C: HttpClient + 'static> Transport for LocalTransport<C> {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        self.downloader
            .download(url, destination)
            .await
            .map_err(|e| match e {
                hashfetch_fetch::Error::SizeExceeded { limit } => Error::SizeExceeded {
                    url: url.to_string(),
                    limit,
                },
                other => Error::Download {
                    url:    url.to_string(),
                    source: Arc::new(other),
                },
            })
    }

    async fn extract(&self, archive: &Path, directory: &Path) -> Result<()> {
        let archive: PathBuf = archive.to_path_buf();
        let directory: PathBuf = directory.to_path_buf();

        let task = {
            let archive = archive.clone();
            tokio::task::spawn_blocking(move || hashfetch_archive::extract_into_empty(&archive, &directory))
        };

        match task.await {
            Ok(Ok(_report)) => Ok(()),
            Ok(Err(e)) => Err(Error::Extraction {
                archive,
                source: Arc::new(e),
            }),
            Err(e) => Err(Error::Transport(format!("extraction task failed: {e}"))),
        }
    }
}
