//! Per-path debouncing of file events.
//!
//! Each path with a pending change owns one sleeping tokio task. A new event
//! for the same path aborts that task and starts a fresh one, so the deadline
//! is always "last event + quiet period". When a task wakes it re-checks its
//! generation under the map lock, which keeps a timer that was already
//! running from firing an entry that has since been re-armed or cancelled.

use crate::events::{FileEvent, SettledIntent, SyncKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

struct Pending {
    kind: SyncKind,
    generation: u64,
    timer: AbortHandle,
}

#[derive(Default)]
struct PendingMap {
    entries: HashMap<PathBuf, Pending>,
    next_generation: u64,
}

fn lock(map: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns a bursty stream of [`FileEvent`]s into one [`SettledIntent`] per
/// path and quiet period.
///
/// Cheap to clone; clones share the pending set.
#[derive(Clone)]
pub struct SyncQueue {
    pending: Arc<Mutex<PendingMap>>,
    quiet_period: Duration,
    sender: mpsc::UnboundedSender<SettledIntent>,
    runtime: Handle,
}

impl SyncQueue {
    /// Create a queue and the receiver its settled intents arrive on.
    ///
    /// Must be called from within a tokio runtime; timers run on it.
    pub fn new(quiet_period: Duration) -> (Self, mpsc::UnboundedReceiver<SettledIntent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            pending: Arc::new(Mutex::new(PendingMap::default())),
            quiet_period,
            sender,
            runtime: Handle::current(),
        };
        (queue, receiver)
    }

    /// Record an event, (re)starting the path's quiet period.
    ///
    /// The pending kind is overwritten, so only the last event of a burst
    /// decides what happens on the board.
    pub fn push(&self, event: FileEvent) {
        let kind = SyncKind::from(event.kind);
        let path = event.path;

        let mut map = lock(&self.pending);
        map.next_generation += 1;
        let generation = map.next_generation;

        let timer = self
            .runtime
            .spawn(settle(
                Arc::clone(&self.pending),
                self.sender.clone(),
                path.clone(),
                generation,
                self.quiet_period,
            ))
            .abort_handle();

        let previous = map.entries.insert(
            path.clone(),
            Pending {
                kind,
                generation,
                timer,
            },
        );
        match previous {
            Some(previous) => {
                previous.timer.abort();
                trace!(path = %path.display(), from = %previous.kind, to = %kind, "Re-armed pending change");
            }
            None => trace!(path = %path.display(), kind = %kind, "Pending change"),
        }
    }

    /// Drop every pending change without firing it. Returns how many were
    /// dropped.
    pub fn cancel_all(&self) -> usize {
        let mut map = lock(&self.pending);
        let cancelled = map.entries.len();
        for (_, pending) in map.entries.drain() {
            pending.timer.abort();
        }
        if cancelled > 0 {
            debug!(cancelled, "Cancelled pending changes");
        }
        cancelled
    }

    /// Number of paths waiting for their quiet period to end.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    /// The kind currently pending for `path`, if any.
    pub fn pending_kind(&self, path: &Path) -> Option<SyncKind> {
        lock(&self.pending).entries.get(path).map(|p| p.kind)
    }

    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }
}

async fn settle(
    pending: Arc<Mutex<PendingMap>>,
    sender: mpsc::UnboundedSender<SettledIntent>,
    path: PathBuf,
    generation: u64,
    quiet_period: Duration,
) {
    tokio::time::sleep(quiet_period).await;

    let mut map = lock(&pending);
    let current = matches!(map.entries.get(&path), Some(p) if p.generation == generation);
    if !current {
        return;
    }
    let Some(entry) = map.entries.remove(&path) else {
        return;
    };

    debug!(path = %path.display(), kind = %entry.kind, "Change settled");
    // Sent under the lock so a later cycle for the same path cannot overtake it.
    if sender
        .send(SettledIntent {
            path,
            kind: entry.kind,
        })
        .is_err()
    {
        debug!("Settled intent dropped, receiver is gone");
    }
}
