//! Error types for configuration handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing configuration.
///
/// A missing `device.cfg` or a missing key is *not* represented here; those
/// lookups succeed with `None`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error while touching a configuration file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File that could not be read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The tool configuration file is not valid TOML for [`crate::StudioConfig`].
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
