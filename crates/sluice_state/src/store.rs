//! Persistent dedup store: marker path → last committed change token.
//!
//! The on-disk shape is a versioned JSON envelope. Loading is tolerant: an
//! absent file, unparseable content, or an unknown schema version all yield
//! an empty store rather than an error, and the next run replays in full.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;

/// Current schema version of the state envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Token committed for a marker whose mtime cannot be read.
pub const FALLBACK_TOKEN: i64 = 1;

/// Change token for a marker: its mtime in nanoseconds since the epoch, or
/// [`FALLBACK_TOKEN`] when the marker cannot be statted.
pub fn marker_token(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map(|age| age.as_nanos() as i64)
        .unwrap_or(FALLBACK_TOKEN)
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskState {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    files: HashMap<String, i64>,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, i64>,
    last_run: Option<DateTime<Utc>>,
    dirty: bool,
}

/// Mutex-guarded token map with an optional JSON backing file.
///
/// All mutators are safe under concurrent callers; `save` is expected to run
/// once, after all concurrent mutation for the run has completed.
#[derive(Debug)]
pub struct Store {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl Store {
    /// A store backed by `path`. Data is empty until [`Store::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// An in-memory store with no backing file; `save` is a no-op.
    pub fn detached() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the backing file if it exists. Missing file, unparseable
    /// content, and unknown schema versions all leave the store empty and
    /// return `Ok`; only a real read failure is an error (which callers
    /// treat as a warning).
    pub fn load(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<DiskState>(&bytes) {
            Ok(disk) if disk.version == SCHEMA_VERSION => {
                let mut inner = self.lock();
                inner.files.extend(disk.files);
                inner.last_run = disk.last_run;
            }
            // Unknown version or garbage content: no prior state.
            _ => {}
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.lock().files.get(key).copied()
    }

    /// Record a token. Marks the store dirty only when the value actually
    /// changes, so re-committing an identical token is a no-op.
    pub fn set(&self, key: &str, token: i64) {
        let mut inner = self.lock();
        if inner.files.get(key) != Some(&token) {
            inner.files.insert(key.to_string(), token);
            inner.dirty = true;
        }
    }

    /// Stamp the run timestamp. Always dirties the store: the persisted
    /// file must reflect the most recent invocation even when no marker
    /// was eligible.
    pub fn set_last_run(&self, at: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.last_run = Some(at);
        inner.dirty = true;
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.lock().last_run
    }

    /// Write the state atomically (temp file then rename). No-op when the
    /// store is clean or has no backing path.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let mut inner = self.lock();
        if !inner.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let disk = DiskState {
            version: SCHEMA_VERSION,
            last_run: inner.last_run,
            files: inner.files.clone(),
        };
        let bytes = serde_json::to_vec(&disk)?;

        let tmp = tmp_path(path);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        inner.dirty = false;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".tmp");
    PathBuf::from(raw)
}
