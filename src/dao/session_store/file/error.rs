//! Error types shared by the file-backed storage implementation.

use std::path::PathBuf;
use thiserror::Error;

/// Convenient result alias returning [`FileDaoError`] failures.
pub type FileResult<T> = Result<T, FileDaoError>;

/// Failures that can occur while reading or writing the local data files.
#[derive(Debug, Error)]
pub enum FileDaoError {
    /// A filesystem operation failed.
    #[error("file store I/O failed for `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A stored JSON document could not be parsed.
    #[error("failed to parse `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory snapshot could not be serialized.
    #[error("failed to serialize session snapshot")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}
