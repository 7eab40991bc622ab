//! Zip extraction for export archives.
//!
//! Entries resolve through the zip crate's `enclosed_name`, so hostile
//! names (absolute paths, `..` components) can never escape the
//! destination. Entry-count, per-entry, total-size, and compression-ratio
//! limits bound what an archive may expand to.

use crate::error::ExportError;
use std::fs::File;
use std::path::{Path, PathBuf};

const MAX_ENTRIES: usize = 100_000;
const MAX_ENTRY_UNCOMPRESSED_BYTES: u64 = 512 * 1024 * 1024;
const MAX_TOTAL_UNCOMPRESSED_BYTES: u64 = 4 * 1024 * 1024 * 1024;
const MAX_COMPRESSION_RATIO: u64 = 200;

#[derive(Clone, Copy)]
pub(crate) struct ExtractionLimits {
    pub max_entries: usize,
    pub max_entry_uncompressed_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
    pub max_compression_ratio: u64,
}

impl ExtractionLimits {
    pub(crate) fn standard() -> Self {
        Self {
            max_entries: MAX_ENTRIES,
            max_entry_uncompressed_bytes: MAX_ENTRY_UNCOMPRESSED_BYTES,
            max_total_uncompressed_bytes: MAX_TOTAL_UNCOMPRESSED_BYTES,
            max_compression_ratio: MAX_COMPRESSION_RATIO,
        }
    }
}

fn corrupt(reason: impl Into<String>) -> ExportError {
    ExportError::ArchiveCorrupt {
        reason: reason.into(),
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Extract `zip_path` into `dest_dir`, returning the extracted file paths.
pub(crate) fn unzip_to_dir(zip_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    unzip_to_dir_with_limits(zip_path, dest_dir, ExtractionLimits::standard())
}

pub(crate) fn unzip_to_dir_with_limits(
    zip_path: &Path,
    dest_dir: &Path,
    limits: ExtractionLimits,
) -> Result<Vec<PathBuf>, ExportError> {
    let file = File::open(zip_path).map_err(|err| io_err(zip_path, err))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| corrupt(err.to_string()))?;

    let entry_count = archive.len();
    if entry_count > limits.max_entries {
        return Err(corrupt(format!(
            "archive has {entry_count} entries, limit is {}",
            limits.max_entries
        )));
    }

    let mut extracted = Vec::new();
    let mut total_uncompressed: u64 = 0;
    for i in 0..entry_count {
        let mut entry = archive.by_index(i).map_err(|err| corrupt(err.to_string()))?;

        let uncompressed_size = entry.size();
        if uncompressed_size > limits.max_entry_uncompressed_bytes {
            return Err(corrupt(format!(
                "entry '{}' is too large ({} bytes, limit {})",
                entry.name(),
                uncompressed_size,
                limits.max_entry_uncompressed_bytes
            )));
        }
        if uncompressed_size > 0 {
            let compressed_size = entry.compressed_size();
            if compressed_size == 0 {
                return Err(corrupt(format!(
                    "entry '{}' has zero compressed size",
                    entry.name()
                )));
            }
            let max_uncompressed = compressed_size.saturating_mul(limits.max_compression_ratio);
            if uncompressed_size > max_uncompressed {
                return Err(corrupt(format!(
                    "entry '{}' exceeds compression ratio limit",
                    entry.name()
                )));
            }
        }
        total_uncompressed = total_uncompressed
            .checked_add(uncompressed_size)
            .ok_or_else(|| corrupt("archive size overflow"))?;
        if total_uncompressed > limits.max_total_uncompressed_bytes {
            return Err(corrupt(format!(
                "archive extracted size {} exceeds limit {}",
                total_uncompressed, limits.max_total_uncompressed_bytes
            )));
        }

        // Hostile names resolve to None and are skipped rather than
        // allowed anywhere near the filesystem.
        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };
        if entry.name().ends_with('/') {
            std::fs::create_dir_all(&outpath).map_err(|err| io_err(&outpath, err))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|err| io_err(parent, err))?;
        }
        let mut outfile = File::create(&outpath).map_err(|err| io_err(&outpath, err))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|err| io_err(&outpath, err))?;
        extracted.push(outpath);
    }

    extracted.sort();
    Ok(extracted)
}
