//! Error types for the sync folder watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up file watching.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The OS watcher could not be created or could not watch the path.
    #[error("File watching error for '{path}': {source}")]
    Notify {
        /// Path being watched.
        path: PathBuf,
        /// Underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: globset::Error,
    },

    /// The sync root is missing or not a directory.
    #[error("Invalid path: {0} is not a directory")]
    InvalidPath(PathBuf),
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;
