use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors from storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Stored record could not be encoded or decoded.
    #[error("serialization error for {key}: {source}")]
    Serialization {
        /// Record key
        key: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// No usable storage location on this platform.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A thread panicked while holding the storage lock.
    #[error("storage lock poisoned")]
    Poisoned,
}
