pub mod config;
pub mod device;
pub mod devices;
pub mod sync;

use anyhow::{Context, Result};
use mpstudio_config::{ConfigStore, StudioConfig};
use mpstudio_device::MpremoteRunner;
use mpstudio_sync::SyncSession;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cli::Cli;

/// Global options every project command needs.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
    pub mpremote: Option<PathBuf>,
}

impl ProjectOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            project: cli.project.clone(),
            config: cli.config.clone(),
            mpremote: cli.mpremote.clone(),
        }
    }

    /// Absolute project directory.
    pub async fn project_dir(&self) -> Result<PathBuf> {
        tokio::fs::canonicalize(&self.project)
            .await
            .with_context(|| format!("Project directory not found: {}", self.project.display()))
    }

    /// Tool settings with command line overrides applied.
    pub async fn settings(&self) -> Result<StudioConfig> {
        let mut settings = StudioConfig::load(self.config.as_deref())
            .await
            .context("Failed to load tool config")?;
        if let Some(mpremote) = &self.mpremote {
            settings.mpremote = Some(mpremote.clone());
        }
        Ok(settings)
    }

    pub async fn store(&self) -> Result<ConfigStore> {
        Ok(ConfigStore::for_project(self.project_dir().await?))
    }

    /// Open the project and start its device channel.
    pub async fn open(&self) -> Result<SyncSession> {
        let project_dir = self.project_dir().await?;
        let settings = self.settings().await?;
        let mpremote = settings.mpremote_command();
        debug!(program = %mpremote.program.display(), args = ?mpremote.args, "Using mpremote");

        SyncSession::open(project_dir, settings, Arc::new(MpremoteRunner::new(mpremote)))
            .await
            .context("Failed to open project")
    }
}
