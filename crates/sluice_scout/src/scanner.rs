//! Filesystem scan: find markers, pair folders, list children.

use crate::error::{Result, ScoutError};
use crate::types::{ChildEntry, Item};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Marker suffix an upstream producer appends once a folder is complete.
/// Matching is case-insensitive in both directions.
pub const MARKER_SUFFIX: &str = ".RDY";

/// Scan behavior toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Descend into subdirectories. Non-recursive scans inspect only the
    /// direct children of the root.
    pub recursive: bool,

    /// Traverse directories that are symlinks. Off by default; this is the
    /// only cycle guard.
    pub follow_symlinks: bool,
}

/// Scan `root` for marker files and pair each with its sibling folder.
///
/// The result is sorted by marker path so repeated scans of an unchanged
/// tree produce identical output regardless of directory enumeration order.
/// Only a bad root or an unrecoverable walk error fails the scan; per-item
/// I/O problems degrade into `missing_folder` or zero-valued entry metadata.
pub fn scan(root: &Path, opts: ScanOptions) -> Result<Vec<Item>> {
    let info = fs::metadata(root).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ScoutError::RootNotFound(root.to_path_buf())
        } else {
            ScoutError::Io(err)
        }
    })?;
    if !info.is_dir() {
        return Err(ScoutError::RootNotADirectory(root.to_path_buf()));
    }

    let mut markers = if opts.recursive {
        collect_markers_recursive(root, opts.follow_symlinks)?
    } else {
        collect_markers_flat(root)?
    };
    markers.sort();

    Ok(markers.into_iter().map(pair_marker).collect())
}

fn is_marker_name(name: &str) -> bool {
    name.to_uppercase().ends_with(MARKER_SUFFIX)
}

fn collect_markers_flat(root: &Path) -> Result<Vec<PathBuf>> {
    let mut markers = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            continue;
        }
        let name = entry.file_name();
        if is_marker_name(&name.to_string_lossy()) {
            markers.push(root.join(name));
        }
    }
    Ok(markers)
}

fn collect_markers_recursive(root: &Path, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    let mut markers = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.map_err(|source| ScoutError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if is_marker_name(&entry.file_name().to_string_lossy()) {
            markers.push(entry.into_path());
        }
    }
    Ok(markers)
}

/// Build the item for one marker: resolve the candidate folder in the
/// marker's own directory and list its immediate children.
fn pair_marker(marker: PathBuf) -> Item {
    let mut item = Item {
        ready_file: marker.clone(),
        folder: None,
        missing_folder: false,
        folder_entries: Vec::new(),
    };

    let candidate = match candidate_folder(&marker) {
        Some(dir) => dir,
        None => {
            item.missing_folder = true;
            return item;
        }
    };

    match fs::metadata(&candidate) {
        Ok(meta) if meta.is_dir() => {
            item.folder = Some(candidate.clone());
            match list_children(&candidate) {
                Ok(entries) => item.folder_entries = entries,
                Err(err) => {
                    // Treat an unlistable folder as missing contents rather
                    // than failing the scan.
                    debug!(folder = %candidate.display(), error = %err, "folder listing failed");
                    item.missing_folder = true;
                }
            }
        }
        _ => item.missing_folder = true,
    }

    item
}

/// The candidate folder is the marker's filename with the suffix removed,
/// resolved next to the marker. Folders are never searched below the
/// marker's own directory.
fn candidate_folder(marker: &Path) -> Option<PathBuf> {
    let stem = marker.file_stem()?;
    if stem.is_empty() {
        return None;
    }
    Some(marker.parent()?.join(stem))
}

fn list_children(folder: &Path) -> std::io::Result<Vec<ChildEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = folder.join(entry.file_name());

        // A failed stat degrades to zero-valued metadata; the entry is
        // still listed.
        let (size, mod_time) = match entry.metadata() {
            Ok(meta) => {
                let mod_time = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(DateTime::UNIX_EPOCH);
                (meta.len(), mod_time)
            }
            Err(_) => (0, DateTime::UNIX_EPOCH),
        };

        entries.push(ChildEntry {
            name,
            size,
            mod_time,
            path,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
