use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an archive entry path against `base`, rejecting anything that
/// would land outside it.
pub fn sanitize_path(entry_path: &Path, base: &Path) -> Result<PathBuf> {
    let mut relative = PathBuf::new();

    for component in entry_path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(Error::ZipSlip {
                        entry: entry_path.to_path_buf(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ZipSlip {
                    entry: entry_path.to_path_buf(),
                });
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidPath);
    }

    Ok(base.join(relative))
}
