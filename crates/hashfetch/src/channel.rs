//! Request/response bridge to a worker that performs downloads and
//! extractions on the caller's behalf.
//!
//! Requests travel over an mpsc queue. The worker answers by broadcasting an
//! [`Event`] on a channel named after the request's filename:
//! `download-file-success-<filename>` / `download-file-error-<filename>`, and
//! `unzip-file-success-<filename>` / `unzip-file-error-<filename>`. A client
//! subscribes before sending and waits for whichever of its pair arrives
//! first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::Transport;

const EVENT_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Download {
        url:       String,
        directory: PathBuf,
        filename:  String,
    },
    Unzip {
        filepath: PathBuf,
        dir:      PathBuf,
        filename: String,
    },
}

#[derive(Clone, Debug)]
pub struct Event {
    pub channel: String,
    pub error:   Option<Error>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Download,
    Unzip,
}

impl Operation {
    fn prefix(self) -> &'static str {
        match self {
            Operation::Download => "download-file",
            Operation::Unzip => "unzip-file",
        }
    }

    pub fn success_channel(self, filename: &str) -> String {
        format!("{}-success-{filename}", self.prefix())
    }

    pub fn error_channel(self, filename: &str) -> String { format!("{}-error-{filename}", self.prefix()) }
}

/// Client half of the bridge.
#[derive(Clone)]
pub struct ChannelTransport {
    requests: mpsc::Sender<Request>,
    events:   broadcast::Sender<Event>,
}

impl ChannelTransport {
    /// Client over an existing request queue and reply bus, for workers
    /// driven elsewhere.
    pub fn new(requests: mpsc::Sender<Request>, events: broadcast::Sender<Event>) -> Self {
        Self { requests, events }
    }

    /// Spawn a worker driving `worker` and return the connected client.
    pub fn spawn<T: Transport>(worker: T, queue: usize) -> (Self, JoinHandle<()>) {
        let (requests, rx) = mpsc::channel(queue);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handle = tokio::spawn(serve(Arc::new(worker), rx, events.clone()));
        (Self::new(requests, events), handle)
    }

    async fn call(&self, op: Operation, filename: &str, request: Request) -> Result<()> {
        let success = op.success_channel(filename);
        let failure = op.error_channel(filename);
        let mut events = self.events.subscribe();

        self.requests
            .send(request)
            .await
            .map_err(|_| Error::Transport("worker is gone".into()))?;

        loop {
            match events.recv().await {
                Ok(event) if event.channel == success => return Ok(()),
                Ok(event) if event.channel == failure => {
                    return Err(event
                        .error
                        .unwrap_or_else(|| Error::Transport(format!("{failure} without payload"))));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The reply may have been among the skipped events.
                    warn!(skipped, channel = %success, "transport events lagged, reply lost");
                    return Err(Error::Transport(format!(
                        "reply for {filename} lost: event channel lagged by {skipped}"
                    )));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::Transport("worker closed the event channel".into()));
                }
            }
        }
    }
}

fn split(path: &Path) -> Result<(PathBuf, String)> {
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Transport(format!("'{}' has no usable file name", path.display())))?;
    Ok((directory, filename.to_string()))
}

impl Transport for ChannelTransport {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let (directory, filename) = split(destination)?;
        let request = Request::Download {
            url: url.to_string(),
            directory,
            filename: filename.clone(),
        };
        self.call(Operation::Download, &filename, request).await?;

        let meta = tokio::fs::metadata(destination)
            .await
            .map_err(Error::io("stat", destination))?;
        Ok(meta.len())
    }

    async fn extract(&self, archive: &Path, directory: &Path) -> Result<()> {
        let (_, filename) = split(archive)?;
        let request = Request::Unzip {
            filepath: archive.to_path_buf(),
            dir:      directory.to_path_buf(),
            filename: filename.clone(),
        };
        self.call(Operation::Unzip, &filename, request).await
    }
}

/// Worker loop: serve requests until every client is dropped.
pub async fn serve<T: Transport>(
    worker: Arc<T>,
    mut requests: mpsc::Receiver<Request>,
    events: broadcast::Sender<Event>,
) {
    while let Some(request) = requests.recv().await {
        let worker = Arc::clone(&worker);
        let events = events.clone();
        tokio::spawn(async move {
            let (op, filename, outcome) = handle(worker.as_ref(), request).await;
            let event = match outcome {
                Ok(()) => Event {
                    channel: op.success_channel(&filename),
                    error:   None,
                },
                Err(e) => Event {
                    channel: op.error_channel(&filename),
                    error:   Some(e),
                },
            };
            debug!(channel = %event.channel, "transport reply");
            // No receivers just means the caller went away.
            let _ = events.send(event);
        });
    }
}

async fn handle<T: Transport>(worker: &T, request: Request) -> (Operation, String, Result<()>) {
    match request {
        Request::Download {
            url,
            directory,
            filename,
        } => {
            let outcome = match validate(&filename) {
                Ok(()) if url.is_empty() || directory.as_os_str().is_empty() => Err(Error::Transport(
                    "invalid url or directory or filename".into(),
                )),
                Ok(()) => worker
                    .download(&url, &directory.join(&filename))
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            (Operation::Download, filename, outcome)
        }
        Request::Unzip {
            filepath,
            dir,
            filename,
        } => {
            let outcome = match validate(&filename) {
                Ok(()) if filepath.as_os_str().is_empty() || dir.as_os_str().is_empty() => {
                    Err(Error::Transport(format!(
                        "invalid filepath ({}) or directory ({})",
                        filepath.display(),
                        dir.display()
                    )))
                }
                Ok(()) => worker.extract(&filepath, &dir).await,
                Err(e) => Err(e),
            };
            (Operation::Unzip, filename, outcome)
        }
    }
}

fn validate(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(Error::Transport(format!("invalid filename '{filename}'")));
    }
    Ok(())
}
