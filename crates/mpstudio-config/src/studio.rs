//! Tool-wide settings loaded from `config.toml`.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Tool settings shared by every project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Quiet period a file must stay unchanged before it is synced.
    pub quiet_period_ms: u64,
    /// Upper bound for one non-interactive mpremote command.
    pub command_timeout_secs: u64,
    /// Explicit mpremote executable.
    pub mpremote: Option<PathBuf>,
    /// Python interpreter to run `-m mpremote` with.
    pub python: Option<PathBuf>,
    /// Glob patterns (relative to the sync folder) that are never synced.
    pub ignore: Vec<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 1200,
            command_timeout_secs: 30,
            mpremote: None,
            python: None,
            ignore: vec![
                "**/__pycache__/**".to_string(),
                "**/*.pyc".to_string(),
                "**/*~".to_string(),
                "**/.*.swp".to_string(),
            ],
        }
    }
}

impl StudioConfig {
    /// `$XDG_CONFIG_HOME/mpstudio/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mpstudio").join("config.toml"))
    }

    /// Load from `path`, or from [`Self::default_path`] when `None`.
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No tool config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::io(path, e)),
        };

        Self::from_toml(&text).map_err(|message| ConfigError::Parse { path, message })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Debounce quiet period.
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Per-command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Work out how to launch mpremote.
    ///
    /// Order: explicit `mpremote`, explicit `python -m mpremote`, the studio
    /// virtualenv interpreter if it exists, then `mpremote` on `PATH`.
    pub fn mpremote_command(&self) -> MpremoteCommand {
        if let Some(program) = &self.mpremote {
            return MpremoteCommand::direct(program.clone());
        }
        if let Some(python) = &self.python {
            return MpremoteCommand::python_module(python.clone());
        }
        if let Some(python) = studio_venv_python().filter(|p| p.exists()) {
            return MpremoteCommand::python_module(python);
        }
        MpremoteCommand::direct(PathBuf::from("mpremote"))
    }
}

/// `~/.micropython-studio/.venv/{bin/python, Scripts/python.exe}`.
fn studio_venv_python() -> Option<PathBuf> {
    let venv = dirs::home_dir()?.join(".micropython-studio").join(".venv");
    Some(if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    })
}

/// Program and leading arguments that start mpremote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpremoteCommand {
    /// Executable.
    pub program: PathBuf,
    /// Arguments placed before every mpremote subcommand.
    pub args: Vec<String>,
}

impl MpremoteCommand {
    /// Run an mpremote executable directly.
    pub fn direct(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    /// Run `python -m mpremote`.
    pub fn python_module(python: PathBuf) -> Self {
        Self {
            program: python,
            args: vec!["-m".to_string(), "mpremote".to_string()],
        }
    }
}
