//! Error types for device commands.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// stderr fragments that mean the board is absent, busy or unplugged.
const CONNECTION_PATTERNS: &[&str] = &[
    "no device found",
    "could not open port",
    "failed to access",
    "device not configured",
];

/// Errors that can occur while executing a device command.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The board is unreachable: no device, port busy or disconnected.
    #[error("Device connection error: {0}")]
    Connection(String),

    /// The board answered but the requested operation failed.
    #[error("Command failed (exit code {code:?}): {message}")]
    Command {
        /// Process exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Trimmed stderr (or stdout when stderr was empty).
        message: String,
    },

    /// The command ran longer than allowed and was killed.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The mpremote executable could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to launch.
        program: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The cross-process port lock could not be taken.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        /// Lock file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// IO error while waiting for the process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel worker is gone.
    #[error("Device channel is closed")]
    ChannelClosed,
}

impl DeviceError {
    /// Classify a failed process from its exit code and output.
    pub fn from_failure(code: Option<i32>, stderr: &str, stdout: &str) -> Self {
        let stderr = stderr.trim();
        let lowered = stderr.to_lowercase();
        if CONNECTION_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return Self::Connection(stderr.to_string());
        }

        let message = if stderr.is_empty() { stdout.trim() } else { stderr };
        Self::Command {
            code,
            message: message.to_string(),
        }
    }

    /// Device absent or disconnected; worth retrying on the next change.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// The operation itself failed. Timeouts count as command failures.
    pub fn is_command_failure(&self) -> bool {
        matches!(self, Self::Command { .. } | Self::Timeout(_))
    }
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
