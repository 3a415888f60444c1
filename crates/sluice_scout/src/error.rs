use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole scan. Per-item problems (an unreadable folder,
/// a failed child stat) degrade inside the item instead of surfacing here.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("scan root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("scan root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error("walk error under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
