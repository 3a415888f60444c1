//! Filesystem sink: delivers folder contents into a local destination tree
//! and records metadata documents as JSON files.

use crate::{
    detect_content_type, stable_doc_id, DeliveredFile, FolderRecord, Sink, SinkError, SinkResult,
};
use anyhow::Context;
use sha2::{Digest, Sha256};
use sluice_pool::{run_parallel, Task};
use sluice_scout::{ChildEntry, MARKER_SUFFIX};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Sink that copies files under a destination root.
///
/// Each file lands at `<dest>/[<prefix>/]<folder basename>/<name>`;
/// metadata documents land under `<dest>/.sluice_meta/[<namespace>/]
/// <collection>/<doc id>.json`.
#[derive(Debug)]
pub struct FsSink {
    dest: PathBuf,
    meta_root: PathBuf,
    file_concurrency: usize,
}

impl FsSink {
    /// `file_concurrency == 0` auto-selects, like the pool itself.
    pub fn new(dest: impl Into<PathBuf>, file_concurrency: usize) -> Self {
        let dest = dest.into();
        let meta_root = dest.join(".sluice_meta");
        Self {
            dest,
            meta_root,
            file_concurrency,
        }
    }

    /// Namespace metadata documents under an extra directory level.
    pub fn with_meta_namespace(mut self, namespace: &str) -> Self {
        self.meta_root = self.dest.join(".sluice_meta").join(namespace);
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

impl Sink for FsSink {
    fn deliver(&self, entries: &[ChildEntry], prefix: &str) -> SinkResult<Vec<DeliveredFile>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let delivered: Mutex<Vec<DeliveredFile>> = Mutex::new(Vec::with_capacity(entries.len()));
        let mut tasks: Vec<Task<'_>> = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(object_name) = eligible_object_name(entry, prefix) else {
                continue;
            };
            let target = self.dest.join(&object_name);
            let delivered = &delivered;

            tasks.push(Box::new(move |_cancel| {
                let checksum = sha256_file(&entry.path)
                    .with_context(|| format!("checksum {}", entry.path.display()))?;
                let size = fs::metadata(&entry.path)
                    .with_context(|| format!("stat {}", entry.path.display()))?
                    .len();

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                fs::copy(&entry.path, &target)
                    .with_context(|| format!("copy to {}", target.display()))?;
                debug!(file = %entry.path.display(), object = %object_name, "delivered");

                let mut out = delivered
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                out.push(DeliveredFile {
                    name: entry.name.clone(),
                    size,
                    checksum,
                    path: object_name,
                    content_type: detect_content_type(&entry.path).to_string(),
                });
                Ok(())
            }));
        }

        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        run_parallel(self.file_concurrency, tasks)
            .map_err(|err| SinkError::source("folder delivery failed", err))?;

        let mut files = delivered.into_inner().unwrap_or_else(|p| p.into_inner());
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn record_metadata(&self, collection: &str, record: &FolderRecord) -> SinkResult<()> {
        if collection.is_empty() {
            return Err(SinkError::message("metadata collection required"));
        }

        let dir = self.meta_root.join(collection);
        fs::create_dir_all(&dir).map_err(|err| {
            SinkError::source(format!("create metadata dir {}", dir.display()), err.into())
        })?;

        let doc = dir.join(format!("{}.json", stable_doc_id(&record.folder_path)));
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|err| SinkError::source("encode metadata record", err.into()))?;
        // Plain overwrite: the id is stable, so re-delivery replaces the
        // previous document.
        fs::write(&doc, bytes).map_err(|err| {
            SinkError::source(format!("write metadata doc {}", doc.display()), err.into())
        })?;
        Ok(())
    }
}

/// Destination-relative object name for an entry, or `None` when the entry
/// must be skipped: directories, symlinks, marker files, and files that
/// vanished since the scan are not delivered and not errors.
fn eligible_object_name(entry: &ChildEntry, prefix: &str) -> Option<String> {
    if entry.path.as_os_str().is_empty() {
        return None;
    }
    let meta = fs::symlink_metadata(&entry.path).ok()?;
    if meta.is_dir() || meta.file_type().is_symlink() {
        return None;
    }
    if entry.name.to_uppercase().ends_with(MARKER_SUFFIX) {
        return None;
    }

    let base = entry
        .path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())?;

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Some(format!("{}/{}", base, entry.name))
    } else {
        Some(format!("{}/{}/{}", prefix, base, entry.name))
    }
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry_for(path: &Path) -> ChildEntry {
        ChildEntry {
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            size: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            mod_time: Utc::now(),
            path: path.to_path_buf(),
        }
    }

    #[test]
    fn delivers_files_with_checksums() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("ORDER100");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("data.txt"), "abc").unwrap();
        fs::write(folder.join("notes.md"), "hello").unwrap();

        let dest = temp.path().join("out");
        let sink = FsSink::new(&dest, 1);
        let entries = vec![
            entry_for(&folder.join("data.txt")),
            entry_for(&folder.join("notes.md")),
        ];

        let files = sink.deliver(&entries, "").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "data.txt");
        assert_eq!(files[0].path, "ORDER100/data.txt");
        assert_eq!(
            files[0].checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(files[0].content_type, "text/plain; charset=utf-8");
        assert!(dest.join("ORDER100/data.txt").exists());
        assert!(dest.join("ORDER100/notes.md").exists());
    }

    #[test]
    fn skips_directories_markers_and_missing_files() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("ORDER100");
        fs::create_dir_all(folder.join("subdir")).unwrap();
        fs::write(folder.join("keep.txt"), "x").unwrap();
        fs::write(folder.join("inner.RDY"), "").unwrap();

        let mut entries = vec![
            entry_for(&folder.join("subdir")),
            entry_for(&folder.join("keep.txt")),
            entry_for(&folder.join("inner.RDY")),
        ];
        entries.push(ChildEntry {
            name: "ghost.txt".to_string(),
            size: 0,
            mod_time: Utc::now(),
            path: folder.join("ghost.txt"),
        });

        let sink = FsSink::new(temp.path().join("out"), 1);
        let files = sink.deliver(&entries, "").unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["keep.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn skips_symlinked_files() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("ORDER100");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(folder.join("real.txt"), folder.join("link.txt")).unwrap();

        let sink = FsSink::new(temp.path().join("out"), 1);
        let entries = vec![
            entry_for(&folder.join("real.txt")),
            entry_for(&folder.join("link.txt")),
        ];
        let files = sink.deliver(&entries, "").unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["real.txt"]);
    }

    #[test]
    fn prefix_prepends_object_names() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("ORDER100");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("data.txt"), "x").unwrap();

        let sink = FsSink::new(temp.path().join("out"), 1);
        let files = sink
            .deliver(&[entry_for(&folder.join("data.txt"))], "incoming/")
            .unwrap();
        assert_eq!(files[0].path, "incoming/ORDER100/data.txt");
    }

    #[test]
    fn metadata_record_overwrites_same_folder() {
        let temp = TempDir::new().unwrap();
        let sink = FsSink::new(temp.path().join("out"), 1).with_meta_namespace("prod");

        let mut record = FolderRecord {
            folder_path: "ORDER100".to_string(),
            delivered_at: Utc::now(),
            files: Vec::new(),
        };
        sink.record_metadata("folders", &record).unwrap();

        record.delivered_at = Utc::now();
        sink.record_metadata("folders", &record).unwrap();

        let dir = temp.path().join("out/.sluice_meta/prod/folders");
        let docs: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn empty_collection_is_rejected() {
        let temp = TempDir::new().unwrap();
        let sink = FsSink::new(temp.path().join("out"), 1);
        let record = FolderRecord {
            folder_path: "X".to_string(),
            delivered_at: Utc::now(),
            files: Vec::new(),
        };
        assert!(sink.record_metadata("", &record).is_err());
    }
}
