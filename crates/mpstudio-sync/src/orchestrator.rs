//! Turning settled intents into device commands.

use crate::error::Result;
use crate::paths::device_path_for;
use mpstudio_config::ConfigStore;
use mpstudio_device::{CommandTicket, DeviceChannel, DeviceCommand, DeviceError};
use mpstudio_watch::{SettledIntent, SyncKind};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Level};

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Files copied to the board.
    pub copied: usize,
    /// Files removed from the board.
    pub removed: usize,
    /// Commands that failed or timed out.
    pub failed: usize,
    /// Intents that had no board path.
    pub skipped: usize,
}

/// Mirrors settled changes of a sync folder onto the board.
///
/// Each intent is submitted to the [`DeviceChannel`] the moment it arrives;
/// a separate task waits for the results in submission order, logs them and
/// stamps `last_sync`. A failed command is logged and forgotten. The next
/// change to the same file is what triggers another attempt.
#[derive(Clone)]
pub struct SyncOrchestrator {
    channel: DeviceChannel,
    store: ConfigStore,
    sync_root: PathBuf,
}

impl SyncOrchestrator {
    /// Orchestrator for files under `sync_root`.
    pub fn new(channel: DeviceChannel, store: ConfigStore, sync_root: impl Into<PathBuf>) -> Self {
        Self {
            channel,
            store,
            sync_root: sync_root.into(),
        }
    }

    /// The local folder mirrored to the board.
    pub fn sync_root(&self) -> &Path {
        &self.sync_root
    }

    /// The device command for `intent`.
    pub fn command_for(&self, intent: &SettledIntent) -> Result<DeviceCommand> {
        let remote = device_path_for(&self.sync_root, &intent.path)?;
        Ok(match intent.kind {
            SyncKind::Upserted => DeviceCommand::Copy {
                local: intent.path.clone(),
                remote,
            },
            SyncKind::Deleted => DeviceCommand::Remove { remote },
        })
    }

    /// Submit the command for `intent` without waiting for it.
    pub fn dispatch(&self, intent: &SettledIntent) -> Result<CommandTicket> {
        let command = self.command_for(intent)?;
        debug!(path = %intent.path.display(), kind = %intent.kind, "Dispatching sync");
        Ok(self.channel.submit(command))
    }

    /// Run [`Self::run`] on a background task.
    pub fn spawn(self, intents: mpsc::UnboundedReceiver<SettledIntent>) -> JoinHandle<SyncStats> {
        tokio::spawn(self.run(intents))
    }

    /// Process intents until the sender side closes, then wait for every
    /// submitted command to finish.
    pub async fn run(self, mut intents: mpsc::UnboundedReceiver<SettledIntent>) -> SyncStats {
        let (completions, pending) = mpsc::unbounded_channel();
        let reporter = tokio::spawn(report_completions(pending, self.store.clone()));

        let mut skipped = 0;
        while let Some(intent) = intents.recv().await {
            match self.dispatch(&intent) {
                Ok(ticket) => {
                    if completions.send((intent, ticket)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(path = %intent.path.display(), error = %e, "Skipping change");
                    skipped += 1;
                }
            }
        }
        drop(completions);

        let mut stats = match reporter.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Sync reporter task failed");
                SyncStats::default()
            }
        };
        stats.skipped += skipped;
        debug!(?stats, "Sync orchestrator stopped");
        stats
    }
}

async fn report_completions(
    mut pending: mpsc::UnboundedReceiver<(SettledIntent, CommandTicket)>,
    store: ConfigStore,
) -> SyncStats {
    let mut stats = SyncStats::default();
    let mut failures = FailureLog::default();

    while let Some((intent, ticket)) = pending.recv().await {
        let path = intent.path.display();
        match ticket.await {
            Ok(output) => {
                failures.reset();
                match intent.kind {
                    SyncKind::Upserted => stats.copied += 1,
                    SyncKind::Deleted => stats.removed += 1,
                }
                info!(
                    path = %path,
                    kind = %intent.kind,
                    elapsed_ms = output.duration.as_millis() as u64,
                    "Synced"
                );
                if let Err(e) = store.touch_last_sync().await {
                    warn!(error = %e, "Failed to record last sync time");
                }
            }
            Err(e) => {
                stats.failed += 1;
                failures.record(&intent, &e);
            }
        }
    }

    stats
}

/// Keeps an unplugged board from flooding the log: the same connection error
/// is reported at `warn` once, then at `debug` until something succeeds.
#[derive(Default)]
struct FailureLog {
    last_connection_error: Option<String>,
}

impl FailureLog {
    /// Log one failure; returns the level it was logged at.
    fn record(&mut self, intent: &SettledIntent, err: &DeviceError) -> Level {
        let path = intent.path.display();
        if !err.is_connection() {
            error!(path = %path, kind = %intent.kind, error = %err, "Sync failed");
            return Level::ERROR;
        }

        let message = err.to_string();
        if self.last_connection_error.as_deref() == Some(message.as_str()) {
            debug!(path = %path, error = %message, "Sync failed, device still unreachable");
            Level::DEBUG
        } else {
            warn!(path = %path, error = %message, "Sync failed, device unreachable");
            self.last_connection_error = Some(message);
            Level::WARN
        }
    }

    fn reset(&mut self) {
        self.last_connection_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(path: &str) -> SettledIntent {
        SettledIntent {
            path: PathBuf::from(path),
            kind: SyncKind::Upserted,
        }
    }

    fn unplugged() -> DeviceError {
        DeviceError::Connection("mpremote: no device found".to_string())
    }

    #[test]
    fn test_repeated_connection_error_warns_once() {
        let mut log = FailureLog::default();

        assert_eq!(log.record(&upsert("/p/a.py"), &unplugged()), Level::WARN);
        assert_eq!(log.record(&upsert("/p/b.py"), &unplugged()), Level::DEBUG);
        assert_eq!(log.record(&upsert("/p/c.py"), &unplugged()), Level::DEBUG);
    }

    #[test]
    fn test_success_resets_streak() {
        let mut log = FailureLog::default();
        log.record(&upsert("/p/a.py"), &unplugged());
        log.reset();

        assert_eq!(log.record(&upsert("/p/a.py"), &unplugged()), Level::WARN);
    }

    #[test]
    fn test_different_connection_error_warns_again() {
        let mut log = FailureLog::default();
        log.record(&upsert("/p/a.py"), &unplugged());

        let busy = DeviceError::Connection("could not open port COM5".to_string());
        assert_eq!(log.record(&upsert("/p/a.py"), &busy), Level::WARN);
        assert_eq!(log.record(&upsert("/p/a.py"), &busy), Level::DEBUG);
    }

    #[test]
    fn test_command_failures_are_always_errors() {
        let mut log = FailureLog::default();
        let failed = DeviceError::Command {
            code: Some(1),
            message: "OSError: [Errno 28] ENOSPC".to_string(),
        };

        assert_eq!(log.record(&upsert("/p/a.py"), &failed), Level::ERROR);
        assert_eq!(log.record(&upsert("/p/a.py"), &failed), Level::ERROR);
        assert_eq!(log.record(&upsert("/p/a.py"), &unplugged()), Level::WARN);
    }
}
