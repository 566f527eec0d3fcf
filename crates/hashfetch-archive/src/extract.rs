//! Format-specific extraction into a staging directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::sanitize::sanitize_path;

/// Summary of a finished extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractReport {
    pub format:      ArchiveFormat,
    pub entry_count: usize,
    pub total_bytes: u64,
}

/// Extract the archive at `archive` into `destination`, detecting the format
/// from its leading bytes.
pub fn extract_file(archive: &Path, destination: &Path) -> Result<ExtractReport> {
    let mut file = File::open(archive).map_err(Error::fs("open", archive))?;
    let format = format::detect_from_reader(&mut file)
        .map_err(Error::fs("read", archive))?
        .ok_or(Error::UnsupportedFormat)?;
    debug!(archive = %archive.display(), ?format, "extracting");

    fs::create_dir_all(destination).map_err(Error::fs("create directory", destination))?;

    let mut report = ExtractReport {
        format,
        entry_count: 0,
        total_bytes: 0,
    };

    match format {
        #[cfg(feature = "zip")]
        ArchiveFormat::Zip => zip_impl::extract(file, destination, &mut report)?,
        #[cfg(feature = "tar")]
        ArchiveFormat::Tar(codec) => tar_impl::extract(file, codec, destination, &mut report)?,
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedFormat),
    }

    Ok(report)
}

fn is_root_entry(path: &Path) -> bool { path.components().all(|c| matches!(c, Component::CurDir)) }

fn write_file(reader: &mut impl Read, target: &Path) -> Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(Error::fs("create directory", parent))?;
    }
    let mut out = File::create(target).map_err(Error::fs("create", target))?;
    io::copy(reader, &mut out).map_err(Error::fs("write", target))
}

fn ensure_directory(target: &Path) -> Result<()> {
    fs::create_dir_all(target).map_err(Error::fs("create directory", target))
}

#[cfg(feature = "zip")]
mod zip_impl {
    use super::*;

    pub(super) fn extract(file: File, destination: &Path, report: &mut ExtractReport) -> Result<()> {
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| Error::Corrupted(e.to_string()))?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| Error::Corrupted(e.to_string()))?;

            let name = entry.enclosed_name().ok_or_else(|| Error::ZipSlip {
                entry: PathBuf::from(entry.name()),
            })?;
            if is_root_entry(&name) {
                continue;
            }
            let target = sanitize_path(&name, destination)?;

            if entry.is_symlink() {
                warn!(entry = %name.display(), "skipping symlink entry");
                continue;
            }

            if entry.is_dir() {
                ensure_directory(&target)?;
            } else {
                report.total_bytes += write_file(&mut entry, &target)?;
            }
            report.entry_count += 1;
        }

        Ok(())
    }
}

#[cfg(feature = "tar")]
mod tar_impl {
    use tar::EntryType;

    use super::*;
    use crate::format::TarCompress;

    pub(super) fn extract(
        file: File,
        codec: TarCompress,
        destination: &Path,
        report: &mut ExtractReport,
    ) -> Result<()> {
        let reader: Box<dyn Read> = match codec {
            TarCompress::None => Box::new(file),
            TarCompress::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        };
        let mut archive = tar::Archive::new(reader);
        let corrupted = |e: io::Error| Error::Corrupted(e.to_string());

        for entry in archive.entries().map_err(corrupted)? {
            let mut entry = entry.map_err(corrupted)?;
            let name = entry.path().map_err(corrupted)?.into_owned();
            if is_root_entry(&name) {
                continue;
            }
            let target = sanitize_path(&name, destination)?;

            match entry.header().entry_type() {
                EntryType::Directory => ensure_directory(&target)?,
                EntryType::Regular | EntryType::Continuous => {
                    report.total_bytes += write_file(&mut entry, &target)?;
                }
                EntryType::Symlink | EntryType::Link => {
                    warn!(entry = %name.display(), "skipping link entry");
                    continue;
                }
                other => {
                    debug!(entry = %name.display(), ?other, "skipping special entry");
                    continue;
                }
            }
            report.entry_count += 1;
        }

        Ok(())
    }
}
