//! Cache archive packing
//!
//! Each cached path is stored in a gzip'd tar under its absolute path with
//! the root (and any drive prefix) dropped, so unpacking relative to the
//! filesystem root puts every file back where it was saved from.

use crate::error::{ImageCacheError, ImageCacheResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder};
use tracing::{debug, warn};

/// Name of a path inside the archive
pub fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Root that archive entries are unpacked relative to
pub fn filesystem_root() -> PathBuf {
    PathBuf::from(std::path::MAIN_SEPARATOR_STR)
}

/// Pack the existing `paths` into a gzip'd tar at `dest`
///
/// Missing paths are skipped with a warning; if none exist the archive is not
/// written. Returns the archive size in bytes.
pub fn create(paths: &[PathBuf], dest: &Path) -> ImageCacheResult<u64> {
    let existing: Vec<&PathBuf> = paths
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("Cache path {} does not exist, skipping", path.display());
            }
            exists
        })
        .collect();

    if existing.is_empty() {
        return Err(ImageCacheError::PathsMissing);
    }

    let file = File::create(dest)
        .map_err(|e| ImageCacheError::io(format!("creating archive {}", dest.display()), e))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    for path in existing {
        let name = entry_name(path);
        debug!("Archiving {} as {}", path.display(), name.display());

        let appended = if path.is_dir() {
            builder.append_dir_all(&name, path)
        } else {
            builder.append_path_with_name(path, &name)
        };
        appended.map_err(|e| ImageCacheError::io(format!("archiving {}", path.display()), e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ImageCacheError::io("finalizing archive", e))?;
    encoder
        .finish()
        .map_err(|e| ImageCacheError::io("finalizing archive", e))?;

    let size = std::fs::metadata(dest)
        .map(|m| m.len())
        .map_err(|e| ImageCacheError::io(format!("reading archive {}", dest.display()), e))?;
    Ok(size)
}

/// Unpack a gzip'd tar created by [`create`] under `root`
///
/// Entries that would land outside `root` are refused.
pub fn extract(archive: &Path, root: &Path) -> ImageCacheResult<()> {
    let file = File::open(archive)
        .map_err(|e| ImageCacheError::io(format!("opening archive {}", archive.display()), e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_mtime(true);

    let entries = archive
        .entries()
        .map_err(|e| ImageCacheError::io("reading archive entries", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ImageCacheError::io("reading archive entry", e))?;
        let name = entry
            .path()
            .map_err(|e| ImageCacheError::io("reading archive entry path", e))?
            .into_owned();

        let unpacked = entry
            .unpack_in(root)
            .map_err(|e| ImageCacheError::io(format!("unpacking {}", name.display()), e))?;
        if !unpacked {
            warn!("Skipped archive entry outside of {}: {}", root.display(), name.display());
        }
    }

    Ok(())
}
