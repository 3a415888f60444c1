//! Delivery sinks for Sluice.
//!
//! A [`Sink`] receives the immediate child files of one matched folder and
//! moves them to an external destination, reporting per-file integrity
//! metadata back to the orchestrator. Sinks also persist one metadata
//! document per delivered folder under a stable identifier so repeated
//! deliveries overwrite, never duplicate.
//!
//! The orchestrator depends only on this contract; the bundled
//! [`FsSink`] delivers to a local destination tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sluice_scout::ChildEntry;
use thiserror::Error;

mod content_type;
mod fs;

pub use content_type::detect_content_type;
pub use fs::FsSink;

/// Errors returned by sink delivery and metadata writes.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{message}")]
    Message { message: String },
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl SinkError {
    fn message(message: impl Into<String>) -> Self {
        SinkError::Message {
            message: message.into(),
        }
    }

    fn source(message: impl Into<String>, source: anyhow::Error) -> Self {
        SinkError::Source {
            message: message.into(),
            source,
        }
    }
}

/// Metadata for one delivered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredFile {
    pub name: String,
    pub size: u64,
    /// SHA-256 of the file content, lowercase hex.
    pub checksum: String,
    /// Destination-relative path the file was delivered under.
    pub path: String,
    pub content_type: String,
}

/// The per-folder metadata document recorded after a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    /// Folder path relative to the scan root, so records don't carry
    /// machine-specific absolute paths.
    pub folder_path: String,
    pub delivered_at: DateTime<Utc>,
    pub files: Vec<DeliveredFile>,
}

/// Contract between the orchestrator and a delivery backend.
///
/// Implementations are injected at construction; the core never sees wire
/// or storage details.
pub trait Sink: Send + Sync {
    /// Deliver the listed entries under `prefix`. Directories, symlinks,
    /// marker files, and entries that vanished since the scan are skipped,
    /// not errors. Returns metadata for each file actually delivered.
    fn deliver(&self, entries: &[ChildEntry], prefix: &str) -> SinkResult<Vec<DeliveredFile>>;

    /// Record one folder's metadata document in `collection`. Writing the
    /// same folder again overwrites the previous record.
    fn record_metadata(&self, collection: &str, record: &FolderRecord) -> SinkResult<()>;
}

/// Stable document id for a folder: a short blake3 digest of its
/// root-relative path. Deterministic, so re-delivery hits the same record.
pub fn stable_doc_id(folder_path: &str) -> String {
    blake3::hash(folder_path.as_bytes()).to_hex()[..16].to_string()
}
