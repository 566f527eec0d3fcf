use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::extract::{ExtractReport, extract_file};

/// How the extracted tree was placed at its final path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The archive had a single top-level directory; its contents became the
    /// final path.
    Collapsed { root: OsString },
    /// The extract directory itself was moved into place.
    AsIs { top_level_entries: usize },
}

/// Extract into `extract_dir`, which must be absent or empty.
pub fn extract_into_empty(archive: &Path, extract_dir: &Path) -> Result<ExtractReport> {
    ensure_empty(extract_dir)?;
    extract_file(archive, extract_dir)
}

/// Move an extracted tree to `final_path`.
///
/// When the top level of `extract_dir` is exactly one directory, that
/// directory is what lands at `final_path` and the emptied `extract_dir` is
/// removed. Every other shape (no entries, several entries, a single file) is
/// moved unchanged. No file name gets special treatment.
pub fn collapse_into(extract_dir: &Path, final_path: &Path) -> Result<Placement> {
    let mut top_level = Vec::new();
    for entry in fs::read_dir(extract_dir).map_err(Error::fs("read directory", extract_dir))? {
        let entry = entry.map_err(Error::fs("read directory", extract_dir))?;
        let file_type = entry
            .file_type()
            .map_err(Error::fs("stat", entry.path()))?;
        top_level.push((entry.file_name(), file_type.is_dir()));
    }

    let placement = match top_level.as_slice() {
        [(name, true)] => {
            let root = extract_dir.join(name);
            fs::rename(&root, final_path).map_err(Error::fs("move", &root))?;
            fs::remove_dir(extract_dir).map_err(Error::fs("remove directory", extract_dir))?;
            Placement::Collapsed { root: name.clone() }
        }
        entries => {
            fs::rename(extract_dir, final_path).map_err(Error::fs("move", extract_dir))?;
            Placement::AsIs {
                top_level_entries: entries.len(),
            }
        }
    };

    debug!(final_path = %final_path.display(), ?placement, "archive placed");
    Ok(placement)
}

fn ensure_empty(dir: &Path) -> Result<()> {
    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Err(Error::NotEmpty(dir.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fs {
            op:     "read directory",
            path:   dir.to_path_buf(),
            source: e,
        }),
    }
}
