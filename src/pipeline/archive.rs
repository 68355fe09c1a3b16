//! Archive packing for multi-file converter outputs.
//!
//! A PNG export produces one image per slide, and the markdown bundle
//! format ships the whole workspace; either way the caller gets exactly
//! one artifact. This stage zips the immediate file entries of a directory
//! (flat names, no recursion into subdirectories) and returns the archive
//! bytes.
//!
//! ## Why `spawn_blocking`?
//!
//! The zip writer is synchronous, and deflate at maximum compression is
//! pure CPU. Running it on the async runtime would stall admission and
//! every other in-flight job, so the whole pack executes on the blocking
//! pool and the async wrapper just awaits it.

use crate::error::ExportError;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry-name predicate applied before anything is stat-ed or opened.
/// `None` admits every file.
pub type NameFilter = Box<dyn Fn(&str) -> bool + Send>;

/// Zip the immediate files of `source` into `dest` and return the bytes.
///
/// Fails with [`ExportError::EmptyDirectory`] when `source` has no entries
/// at all, and with [`ExportError::NoMatchingFiles`] when entries exist but
/// none survive the filter (subdirectories never count as matches). The
/// returned bytes are read back from `dest` only after the archive has
/// fully flushed to storage.
pub async fn pack_directory(
    source: PathBuf,
    dest: PathBuf,
    filter: Option<NameFilter>,
) -> Result<Vec<u8>, ExportError> {
    tokio::task::spawn_blocking(move || pack_directory_blocking(&source, &dest, filter))
        .await
        .map_err(|e| ExportError::Internal(format!("Archive task panicked: {}", e)))?
}

fn pack_directory_blocking(
    source: &Path,
    dest: &Path,
    filter: Option<NameFilter>,
) -> Result<Vec<u8>, ExportError> {
    let archive_err = |e: zip::result::ZipError| ExportError::Archive {
        path: dest.to_path_buf(),
        source: e,
    };
    let archive_io = |e: io::Error| ExportError::Archive {
        path: dest.to_path_buf(),
        source: e.into(),
    };

    // Snapshot the listing before the destination file exists, so an
    // archive placed inside the directory it packs never lists itself.
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(source).map_err(archive_io)? {
        entries.push(entry.map_err(archive_io)?);
    }
    if entries.is_empty() {
        return Err(ExportError::EmptyDirectory {
            path: source.to_path_buf(),
        });
    }

    let out = File::create(dest).map_err(archive_io)?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut added = 0usize;
    for entry in &entries {
        let path = entry.path();
        // A stale artifact left by an earlier run over the same workspace
        // must not get packed into its own replacement.
        if path == dest {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            // Zip entry names are strings; skip the rare non-UTF-8 file.
            continue;
        };
        if let Some(filter) = &filter {
            if !filter(name) {
                continue;
            }
        }
        let metadata = entry.metadata().map_err(archive_io)?;
        if !metadata.is_file() {
            continue;
        }

        zip.start_file(name, options).map_err(archive_err)?;
        let mut input = File::open(&path).map_err(archive_io)?;
        io::copy(&mut input, &mut zip).map_err(archive_io)?;
        added += 1;
    }

    if added == 0 {
        return Err(ExportError::NoMatchingFiles {
            path: source.to_path_buf(),
        });
    }

    // finish() writes the central directory; sync_all() makes every byte
    // durable before the read-back. Reading earlier can return a truncated
    // archive.
    let out = zip.finish().map_err(archive_err)?;
    out.sync_all().map_err(archive_io)?;

    debug!(
        "Packed {} files from {} into {}",
        added,
        source.display(),
        dest.display()
    );

    std::fs::read(dest).map_err(|e| ExportError::ArtifactRead {
        path: dest.to_path_buf(),
        source: e,
    })
}
