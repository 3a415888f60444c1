//! Sluice Scout - marker discovery layer.
//!
//! Scout walks a directory tree looking for `.RDY` marker files dropped by
//! an upstream producer, pairs each marker with the sibling folder sharing
//! its base name, and lists that folder's immediate children. Eligibility
//! filtering and delivery happen downstream in the orchestrator.

pub mod scanner;
pub mod types;

mod error;

pub use error::{Result, ScoutError};
pub use scanner::{scan, ScanOptions, MARKER_SUFFIX};
pub use types::{ChildEntry, Item};
