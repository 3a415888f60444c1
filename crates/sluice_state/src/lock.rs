//! Advisory cross-process lock.
//!
//! Mutual exclusion between Sluice runs on the same root relies on the
//! filesystem's atomic exclusive-create. A lock file older than the TTL is
//! presumed abandoned by a crashed process and reclaimed with a single
//! delete-and-retry. Single host only; the staleness check is a heuristic,
//! not a correctness guarantee.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Locks older than this are treated as abandoned.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30 * 60);

/// Handle to one acquisition attempt. Releasing is idempotent and removes
/// the lock file only if this attempt owns it; dropping the guard releases.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owned: bool,
}

impl LockGuard {
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Remove the lock file if owned. Safe to call any number of times;
    /// an already-removed file is tolerated.
    pub fn release(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove lock file");
            }
        }
        self.owned = false;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Attempt to take the lock at `path` with the default TTL and wall clock.
///
/// `acquired == false` is a normal outcome (another live process holds the
/// lock); the returned guard is inert in that case. An error is returned
/// only for an irrecoverable create failure on a path with no existing
/// lock file.
pub fn acquire_lock(path: &Path) -> Result<(LockGuard, bool)> {
    acquire_lock_with(path, DEFAULT_LOCK_TTL, SystemTime::now)
}

/// [`acquire_lock`] with TTL and clock injectable for tests.
pub fn acquire_lock_with(
    path: &Path,
    ttl: Duration,
    now: impl Fn() -> SystemTime,
) -> Result<(LockGuard, bool)> {
    let mut guard = LockGuard {
        path: path.to_path_buf(),
        owned: false,
    };

    let file = match try_create(path) {
        Ok(file) => Some(file),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if is_stale(path, ttl, &now) {
                // Presumed abandoned: remove and retry exactly once. Losing
                // the retry race to another process is a normal outcome.
                let _ = fs::remove_file(path);
                try_create(path).ok()
            } else {
                None
            }
        }
        Err(err) => return Err(err.into()),
    };

    let Some(mut file) = file else {
        return Ok((guard, false));
    };

    guard.owned = true;

    // Diagnostic content for humans; never parsed back.
    let stamp: DateTime<Utc> = now().into();
    let _ = writeln!(
        file,
        "pid={} time={}",
        std::process::id(),
        stamp.to_rfc3339()
    );

    Ok((guard, true))
}

fn try_create(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// A lock file we cannot stat counts as held, not stale.
fn is_stale(path: &Path, ttl: Duration, now: &impl Fn() -> SystemTime) -> bool {
    let Ok(mtime) = fs::metadata(path).and_then(|meta| meta.modified()) else {
        return false;
    };
    now()
        .duration_since(mtime)
        .map(|age| age > ttl)
        .unwrap_or(false)
}
