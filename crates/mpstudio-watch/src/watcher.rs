//! Recursive notify watcher feeding the [`SyncQueue`].

use crate::error::{Result, WatchError};
use crate::events::{FileEvent, FileEventKind};
use crate::filter::IgnoreFilter;
use crate::queue::SyncQueue;
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Watches a sync root and pushes every relevant change into a [`SyncQueue`].
///
/// Dropping the watcher stops both the OS watch and the forwarding task.
/// Changes already pending in the queue are left alone.
pub struct SyncWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl SyncWatcher {
    /// Start watching `root` recursively.
    pub fn start(root: &Path, queue: SyncQueue, filter: IgnoreFilter) -> Result<Self> {
        if !root.is_dir() {
            return Err(WatchError::InvalidPath(root.to_path_buf()));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<FileEvent>();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for file_event in map_notify_event(&event) {
                        if tx.send(file_event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => error!(error = %e, "Notify error"),
            },
            notify::Config::default(),
        )
        .map_err(|source| WatchError::Notify {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                path: root.to_path_buf(),
                source,
            })?;

        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if filter.is_ignored(&event.path) {
                    trace!(path = %event.path.display(), "Ignored change");
                    continue;
                }
                if event.kind != FileEventKind::Deleted && event.path.is_dir() {
                    continue;
                }
                queue.push(event);
            }
        });

        info!(root = %root.display(), "Watching sync folder");
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
            forward,
        })
    }

    /// The watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for SyncWatcher {
    fn drop(&mut self) {
        self.forward.abort();
        info!(root = %self.root.display(), "Stopped watching sync folder");
    }
}

/// Translate one notify event into zero or more file events.
///
/// Renames become a delete of the old path and a create of the new one, so
/// the board ends up with the file under its new name only. Directory
/// removals are dropped; their files arrive as separate removals.
pub fn map_notify_event(event: &notify::Event) -> Vec<FileEvent> {
    let paths = &event.paths;
    let each = |kind: FileEventKind| -> Vec<FileEvent> {
        paths
            .iter()
            .map(|path| FileEvent::new(kind, path.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(FileEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(FileEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
            [from, to, ..] => vec![FileEvent::deleted(from.clone()), FileEvent::created(to.clone())],
            _ => each(FileEventKind::Modified),
        },
        // Backends that cannot tell the two ends of a rename apart.
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|path| {
                if path.exists() {
                    FileEvent::created(path.clone())
                } else {
                    FileEvent::deleted(path.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => each(FileEventKind::Modified),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => each(FileEventKind::Deleted),
        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}
