//! Error types for the sync layer.

use mpstudio_config::ConfigError;
use mpstudio_device::DeviceError;
use mpstudio_watch::WatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while syncing a project to its board.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A device command failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// `device.cfg` could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The sync folder could not be watched.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// A changed path does not live under the sync folder.
    #[error("{path} is outside the sync folder {root}")]
    OutsideRoot {
        /// Offending path.
        path: PathBuf,
        /// Sync folder.
        root: PathBuf,
    },

    /// IO error while preparing the sync folder.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
