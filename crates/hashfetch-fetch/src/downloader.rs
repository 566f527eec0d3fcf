use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::HttpClient;

/// Default response ceiling: 10 MiB.
pub const MAX_DOWNLOAD_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct DownloadOptions {
    pub max_bytes: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_bytes: MAX_DOWNLOAD_SIZE,
        }
    }
}

impl DownloadOptions {
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Streams a response body to disk, refusing anything over the size ceiling.
pub struct Downloader<C: HttpClient> {
    client:  C,
    options: DownloadOptions,
}

impl<C: HttpClient> Downloader<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: DownloadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> DownloadOptions { self.options }

    /// Download `url` into `destination`, replacing any existing file.
    ///
    /// On any failure the partially written destination is removed. On
    /// success the file is synced and closed before the byte count is
    /// returned.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        debug!(url, destination = %destination.display(), "starting download");

        match self.stream_to(url, destination).await {
            Ok(bytes) => {
                debug!(url, bytes, "download complete");
                Ok(bytes)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(
                        path = %destination.display(),
                        error = %remove_err,
                        "failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let write_err = |source| Error::Write {
            path: destination.to_path_buf(),
            source,
        };

        let mut stream = self.client.stream(url).await?;
        let mut file = tokio::fs::File::create(destination).await.map_err(write_err)?;
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;

            if received > self.options.max_bytes {
                // Dropping the stream aborts the response body.
                drop(stream);
                drop(file);
                return Err(Error::SizeExceeded {
                    limit: self.options.max_bytes,
                });
            }

            file.write_all(&chunk).await.map_err(write_err)?;
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        Ok(received)
    }
}
