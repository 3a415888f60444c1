//! Scan result types. These double as the report wire format: the
//! orchestrator serializes eligible items as-is into the JSON report array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An immediate child of a matched folder. No recursion: nested structure
/// is never expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEntry {
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub path: PathBuf,
}

/// One discovered marker and its pairing outcome. Items are rebuilt fresh
/// on every scan and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Absolute path of the marker file.
    pub ready_file: PathBuf,

    /// Absolute path of the candidate folder, when one was found next to
    /// the marker.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub folder: Option<PathBuf>,

    /// True when the candidate folder is absent, not a directory, or could
    /// not be listed. Such items are skipped by every downstream path.
    pub missing_folder: bool,

    /// Immediate children of the folder, sorted by name.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub folder_entries: Vec<ChildEntry>,
}

impl Item {
    /// Whether this item has a deliverable folder.
    pub fn has_folder(&self) -> bool {
        !self.missing_folder && self.folder.is_some()
    }
}
