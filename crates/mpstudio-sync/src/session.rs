//! Per-project sync session.

use crate::error::{Result, SyncError};
use crate::orchestrator::{SyncOrchestrator, SyncStats};
use mpstudio_config::{ConfigStore, DeviceConfig, StudioConfig};
use mpstudio_device::{
    match_device, ChannelConfig, CommandRunner, DeviceChannel, DeviceMatch, DevicePrompt,
    PortLocks,
};
use mpstudio_watch::{IgnoreFilter, SyncQueue, SyncWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct ActiveSync {
    queue: SyncQueue,
    watcher: SyncWatcher,
    orchestrator: JoinHandle<SyncStats>,
}

/// Everything one project needs to talk to its board: where the project
/// lives, which folder is mirrored, its `device.cfg` and the device channel.
///
/// Several sessions can live in one process; nothing here is global.
pub struct SyncSession {
    project_dir: PathBuf,
    sync_root: PathBuf,
    store: ConfigStore,
    channel: DeviceChannel,
    settings: StudioConfig,
    active: Option<ActiveSync>,
}

impl SyncSession {
    /// Open the project at `project_dir`, reading its `device.cfg` and
    /// starting a device channel on the configured port. The channel takes
    /// the machine-wide port lock around every board command, so other `mps`
    /// processes wait their turn.
    pub async fn open(
        project_dir: impl Into<PathBuf>,
        settings: StudioConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let project_dir = project_dir.into();
        let store = ConfigStore::for_project(&project_dir);
        let device = DeviceConfig::load(&store).await?;
        let sync_root = device.sync_root(&project_dir);

        let channel = DeviceChannel::spawn(
            runner,
            ChannelConfig {
                command_timeout: settings.command_timeout(),
                port: device.port.clone(),
                locks: Some(PortLocks::new(PortLocks::default_dir())),
            },
        );

        debug!(
            project = %project_dir.display(),
            sync_root = %sync_root.display(),
            port = ?device.port,
            "Opened project"
        );
        Ok(Self::with_channel(project_dir, sync_root, store, channel, settings))
    }

    /// Assemble a session from existing parts.
    pub fn with_channel(
        project_dir: PathBuf,
        sync_root: PathBuf,
        store: ConfigStore,
        channel: DeviceChannel,
        settings: StudioConfig,
    ) -> Self {
        Self {
            project_dir,
            sync_root,
            store,
            channel,
            settings,
            active: None,
        }
    }

    /// The project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The folder mirrored to the board.
    pub fn sync_root(&self) -> &Path {
        &self.sync_root
    }

    /// The project's `device.cfg`.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The channel every device command of this project goes through.
    pub fn channel(&self) -> &DeviceChannel {
        &self.channel
    }

    /// Tool settings in effect.
    pub fn settings(&self) -> &StudioConfig {
        &self.settings
    }

    /// Whether auto-sync is running.
    pub fn is_syncing(&self) -> bool {
        self.active.is_some()
    }

    /// Number of changes waiting for their quiet period.
    pub fn pending_changes(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.queue.pending_count())
    }

    /// Start mirroring the sync folder. Creates the folder if needed and
    /// resolves it to its canonical path, which [`Self::sync_root`] reports
    /// from then on.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            debug!("Auto-sync already running");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.sync_root)
            .await
            .map_err(|source| SyncError::Io {
                path: self.sync_root.clone(),
                source,
            })?;
        // Watcher paths come back resolved; the root has to match them.
        self.sync_root = tokio::fs::canonicalize(&self.sync_root)
            .await
            .map_err(|source| SyncError::Io {
                path: self.sync_root.clone(),
                source,
            })?;

        // Stamping last_sync rewrites device.cfg; if it lives in the sync
        // folder, syncing it would stamp it again.
        let config_file = resolve_file(self.store.path()).await;
        let filter =
            IgnoreFilter::new(&self.sync_root, &self.settings.ignore)?.exclude(config_file);
        let (queue, intents) = SyncQueue::new(self.settings.quiet_period());
        let watcher = SyncWatcher::start(&self.sync_root, queue.clone(), filter)?;
        let orchestrator = SyncOrchestrator::new(
            self.channel.clone(),
            self.store.clone(),
            self.sync_root.clone(),
        )
        .spawn(intents);

        info!(
            sync_root = %self.sync_root.display(),
            quiet_period_ms = self.settings.quiet_period_ms,
            "Auto-sync enabled"
        );
        self.active = Some(ActiveSync {
            queue,
            watcher,
            orchestrator,
        });
        Ok(())
    }

    /// Stop mirroring. Pending changes are dropped without firing; commands
    /// already handed to the device channel run to completion, and this
    /// waits for them. Returns the run's counters, `None` if sync was off.
    pub async fn disable(&mut self) -> Option<SyncStats> {
        let active = self.active.take()?;
        drop(active.watcher);
        let cancelled = active.queue.cancel_all();
        drop(active.queue);

        let stats = match active.orchestrator.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Sync orchestrator task failed");
                SyncStats::default()
            }
        };
        info!(cancelled, ?stats, "Auto-sync disabled");
        Some(stats)
    }

    /// Look for the project's board and point the channel at it.
    pub async fn refresh_device(&self, prompt: &dyn DevicePrompt) -> Result<Option<DeviceMatch>> {
        refresh_device(&self.channel, &self.store, prompt).await
    }
}

/// `path` with its parent directory resolved, as the watcher will report it.
/// Falls back to `path` unchanged when the parent cannot be resolved.
async fn resolve_file(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    match tokio::fs::canonicalize(parent).await {
        Ok(parent) => parent.join(name),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Could not resolve config path");
            path.to_path_buf()
        }
    }
}

/// Find the project's board among the attached ones.
///
/// A board with the bound `deviceId` is reused silently, even on a new port.
/// An unbound project asks `prompt` about each candidate. A match is
/// persisted to `device.cfg` and becomes the channel's port; otherwise the
/// channel falls back to the configured port.
pub async fn refresh_device(
    channel: &DeviceChannel,
    store: &ConfigStore,
    prompt: &dyn DevicePrompt,
) -> Result<Option<DeviceMatch>> {
    let config = DeviceConfig::load(store).await?;
    let devices = channel.list().await;
    debug!(count = devices.len(), "Listed devices");

    let Some(found) = match_device(&devices, config.bound_device_id(), prompt) else {
        match config.port {
            Some(port) => {
                warn!(port = %port, "No matching device found, using configured port");
                channel.set_port(Some(port));
            }
            None => warn!("No matching device found"),
        }
        return Ok(None);
    };

    let device = found.device();
    let port_changed = config.port.as_deref() != Some(device.port.as_str());
    if matches!(found, DeviceMatch::Confirmed(_)) || port_changed {
        store.record_device(&device.port, &device.vidpid).await?;
    }
    if port_changed {
        info!(
            from = ?config.port,
            to = %device.port,
            family = %device.family(),
            "Device moved to a new port"
        );
    }
    channel.set_port(Some(device.port.clone()));

    Ok(Some(found))
}
