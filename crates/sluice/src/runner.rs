//! The orchestrator: one full pass from lock acquisition to summary.

use crate::config::Config;
use anyhow::{Context, Result};
use chrono::Utc;
use sluice_pool::{run_parallel, Task};
use sluice_scout::{scan, Item, ScanOptions};
use sluice_sinks::{FolderRecord, Sink};
use sluice_state::{acquire_lock, marker_token, Store};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// How a run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another live process holds the lock; no work was performed.
    LockHeld,
    Completed(RunSummary),
}

/// Counts reported at the end of every completed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub emitted: usize,
    pub skipped: usize,
}

/// Execute one run.
///
/// With a sink, every eligible item becomes one delivery task; without one,
/// the eligible items are written to `report` as a single JSON array (and
/// nothing at all is written when no item is eligible, so downstream
/// tooling can tell "nothing new" from "never ran").
///
/// Per-item failures are logged and isolated; the run only fails for setup
/// problems (bad root, irrecoverable lock error).
pub fn run(cfg: &Config, sink: Option<&dyn Sink>, report: &mut dyn Write) -> Result<RunOutcome> {
    let (mut lock, acquired) = acquire_lock(&cfg.lock_file).context("acquire lock")?;
    if !acquired {
        info!(
            "another sluice process holds lock {}; skip execution",
            cfg.lock_file.display()
        );
        return Ok(RunOutcome::LockHeld);
    }

    let store = match &cfg.state_file {
        Some(path) => {
            info!("using state file: {}", path.display());
            let store = Store::new(path);
            if let Err(err) = store.load() {
                warn!("state load warning: {err}");
            }
            Some(store)
        }
        None => {
            info!("state disabled: ignoring prior runs and forcing full emit");
            None
        }
    };

    let options = ScanOptions {
        recursive: cfg.recursive,
        follow_symlinks: cfg.follow_symlinks,
    };
    let items = scan(&cfg.root, options).context("scan")?;

    let (eligible, skipped) = classify(&items, store.as_ref());
    let emitted = eligible.len();

    match sink {
        Some(sink) => deliver_eligible(cfg, sink, &eligible, store.as_ref()),
        None => {
            if !eligible.is_empty() {
                serde_json::to_writer(&mut *report, &eligible).context("encode report")?;
                report.write_all(b"\n").context("write report")?;
                // Reporting is this mode's delivery: commit tokens only
                // once the whole array has been written.
                if let Some(store) = &store {
                    for item in &eligible {
                        store.set(&path_key(&item.ready_file), marker_token(&item.ready_file));
                    }
                }
            }
        }
    }

    // The persisted timestamp must reflect this invocation even when
    // nothing was eligible.
    if let Some(store) = &store {
        store.set_last_run(Utc::now());
        if let Err(err) = store.save() {
            warn!("state save warning: {err}");
        }
    }

    let summary = RunSummary {
        scanned: items.len(),
        emitted,
        skipped,
    };
    info!(
        "summary: scanned={} emitted={} skipped={}",
        summary.scanned, summary.emitted, summary.skipped
    );

    lock.release();
    Ok(RunOutcome::Completed(summary))
}

/// Split the scan result into eligible items and a skip count.
///
/// Items without a companion folder never proceed. With state enabled, a
/// marker whose mtime matches its committed token is skipped; a changed or
/// unknown mtime makes it eligible again.
fn classify<'a>(items: &'a [Item], store: Option<&Store>) -> (Vec<&'a Item>, usize) {
    let mut eligible = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        if !item.has_folder() {
            info!("skip (missing folder): {}", item.ready_file.display());
            skipped += 1;
            continue;
        }

        if let Some(store) = store {
            let current = marker_token(&item.ready_file);
            match store.get(&path_key(&item.ready_file)) {
                Some(prev) if prev == current => {
                    info!("skip (unchanged): {}", item.ready_file.display());
                    skipped += 1;
                    continue;
                }
                Some(_) => info!("emit (changed): {}", item.ready_file.display()),
                None => info!("emit (new): {}", item.ready_file.display()),
            }
        } else {
            info!("emit (new): {}", item.ready_file.display());
        }

        eligible.push(item);
    }

    (eligible, skipped)
}

/// One outer pool task per eligible item. A task delivers the folder's
/// files, optionally records metadata, and only then commits the marker's
/// token. Failures are logged and confined to their own item.
fn deliver_eligible(cfg: &Config, sink: &dyn Sink, eligible: &[&Item], store: Option<&Store>) {
    let tasks: Vec<Task<'_>> = eligible
        .iter()
        .map(|item| -> Task<'_> {
            Box::new(move |_cancel| {
                let Some(folder) = item.folder.as_deref() else {
                    return Ok(());
                };

                let files = match sink.deliver(&item.folder_entries, "") {
                    Ok(files) => files,
                    Err(err) => {
                        warn!("delivery warning: folder={} err={err}", folder.display());
                        return Ok(());
                    }
                };

                if let Some(meta) = &cfg.meta {
                    let record = FolderRecord {
                        folder_path: relative_folder(&cfg.root, folder),
                        delivered_at: Utc::now(),
                        files,
                    };
                    if let Err(err) = sink.record_metadata(&meta.collection, &record) {
                        warn!("metadata warning: folder={} err={err}", folder.display());
                        return Ok(());
                    }
                }

                // Re-stat at commit time so a marker rewritten mid-run is
                // picked up again next run. A vanished marker commits the
                // fallback token: the folder was delivered, don't re-emit.
                if let Some(store) = store {
                    store.set(&path_key(&item.ready_file), marker_token(&item.ready_file));
                }
                Ok(())
            })
        })
        .collect();

    if let Err(err) = run_parallel(cfg.folder_concurrency, tasks) {
        warn!("folder delivery warning: {err}");
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Folder path relative to the scan root for metadata records; falls back
/// to the absolute path when the folder is not under the root.
fn relative_folder(root: &Path, folder: &Path) -> String {
    folder
        .strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(folder)
        .to_string_lossy()
        .into_owned()
}
