use std::io;
use std::path::{Path, PathBuf};

use hashfetch_verify::ContentHash;
use tracing::debug;

use crate::error::{Error, Result};

const FILES_DIR: &str = "files";
const PARTIAL_DIR: &str = "partial";
const PARTIAL_EXTRACT_DIR: &str = "partial-extract";
const LEDGER_FILE: &str = "fail_history.json";

/// What a finished cache entry turned out to be on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    File,
    Directory,
}

/// Directory layout of the content store.
///
/// ```text
/// <root>/files/<hash>                   finished, verified artifacts
/// <root>/partial/<hash>.part            in-progress downloads
/// <root>/partial-extract/<hash>.part    in-progress extractions
/// <root>/fail_history.json              retry ledger
/// ```
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn files_dir(&self) -> PathBuf { self.root.join(FILES_DIR) }

    pub fn partial_dir(&self) -> PathBuf { self.root.join(PARTIAL_DIR) }

    pub fn partial_extract_dir(&self) -> PathBuf { self.root.join(PARTIAL_EXTRACT_DIR) }

    pub fn ledger_path(&self) -> PathBuf { self.root.join(LEDGER_FILE) }

    pub fn file_path(&self, hash: &ContentHash) -> PathBuf { self.files_dir().join(hash.as_str()) }

    pub fn partial_path(&self, hash: &ContentHash) -> PathBuf {
        self.partial_dir().join(format!("{hash}.part"))
    }

    pub fn partial_extract_path(&self, hash: &ContentHash) -> PathBuf {
        self.partial_extract_dir().join(format!("{hash}.part"))
    }

    /// Prepare the layout for a new process lifetime.
    ///
    /// `root` and `files` are created if missing and left untouched
    /// otherwise. `partial` and `partial-extract` are emptied: work left over
    /// from a crashed run is never resumed.
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(Error::io("create directory", &self.root))?;

        let files_dir = self.files_dir();
        let (files, partial, extract) = tokio::join!(
            tokio::fs::create_dir_all(&files_dir),
            empty_dir(self.partial_dir()),
            empty_dir(self.partial_extract_dir()),
        );
        files.map_err(Error::io("create directory", &files_dir))?;
        partial?;
        extract?;

        debug!(root = %self.root.display(), "content store ready");
        Ok(())
    }

    /// Stat `files/<hash>`, following symlinks.
    pub async fn lookup(&self, hash: &ContentHash) -> Result<Option<ArtifactKind>> {
        let path = self.file_path(hash);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(ArtifactKind::Directory)),
            Ok(_) => Ok(Some(ArtifactKind::File)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io {
                op: "stat",
                path,
                source: e,
            }),
        }
    }
}

async fn empty_dir(dir: PathBuf) -> Result<()> {
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::Io {
                op:     "clear directory",
                path:   dir,
                source: e,
            });
        }
    }
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(Error::io("create directory", &dir))
}
