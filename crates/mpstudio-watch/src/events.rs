//! File event types and the settled intents derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A raw file system event for one path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEvent {
    /// Kind of file event.
    pub kind: FileEventKind,

    /// Absolute path of the file.
    pub path: PathBuf,

    /// Timestamp when the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event stamped with the current time.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for a `Created` event.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Created, path)
    }

    /// Shorthand for a `Modified` event.
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Modified, path)
    }

    /// Shorthand for a `Deleted` event.
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Deleted, path)
    }
}

/// Kinds of file events delivered by the watcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created (or renamed into place).
    Created,
    /// File content or metadata changed.
    Modified,
    /// File was deleted (or renamed away).
    Deleted,
}

impl FileEventKind {
    /// Get a string representation of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// What the board should end up with for a path.
///
/// Created and Modified both mean "copy the current content", so they fold
/// into `Upserted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncKind {
    /// Copy the local file to the board.
    Upserted,
    /// Remove the file from the board.
    Deleted,
}

impl From<FileEventKind> for SyncKind {
    fn from(kind: FileEventKind) -> Self {
        match kind {
            FileEventKind::Created | FileEventKind::Modified => Self::Upserted,
            FileEventKind::Deleted => Self::Deleted,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upserted => "upserted",
            Self::Deleted => "deleted",
        })
    }
}

/// One coalesced notification, emitted once a path has been quiet for the
/// whole debounce window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettledIntent {
    /// Absolute local path.
    pub path: PathBuf,
    /// Kind of the last event seen for the path.
    pub kind: SyncKind,
}
