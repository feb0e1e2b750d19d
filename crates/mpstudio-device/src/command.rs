//! Device commands and their mpremote argument lists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Script run on the board by [`DeviceCommand::Unmount`].
const UNMOUNT_CODE: &str = "import os; os.umount('/remote')";

/// A path on the board's filesystem, always written with a leading `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicePath(String);

impl DevicePath {
    /// Build from a path relative to the board's root, `/` separated.
    pub fn from_relative(relative: &str) -> Self {
        Self(format!(":{}", relative.trim_start_matches('/')))
    }

    /// Accept user input with or without the leading `:`.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(rest) => Self::from_relative(rest),
            None => Self::from_relative(raw),
        }
    }

    /// The mpremote form, e.g. `:lib/sensor.py`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the tool asks a board to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Enumerate attached boards.
    List,
    /// Copy a local file onto the board.
    Copy {
        /// Local source file.
        local: PathBuf,
        /// Destination on the board.
        remote: DevicePath,
    },
    /// Delete a file from the board.
    Remove {
        /// File on the board.
        remote: DevicePath,
    },
    /// Run a local script, optionally with a folder mounted as `/remote`.
    Run {
        /// Script to run.
        file: PathBuf,
        /// Folder to mount first.
        mount: Option<PathBuf>,
    },
    /// Execute a Python snippet.
    Exec {
        /// Source code.
        code: String,
    },
    /// Mount a local folder as `/remote` and attach a REPL.
    Mount {
        /// Folder to mount.
        dir: PathBuf,
    },
    /// Unmount `/remote`.
    Unmount,
    /// Attach to the REPL without resetting the board.
    Repl,
    /// Soft-reset the board, stopping a running script.
    SoftReset,
}

impl DeviceCommand {
    /// mpremote arguments after any `connect <port>` prefix.
    pub fn args(&self) -> Vec<String> {
        let path = |p: &Path| p.to_string_lossy().into_owned();
        match self {
            Self::List => vec!["connect".into(), "list".into()],
            Self::Copy { local, remote } => vec![
                "fs".into(),
                "cp".into(),
                path(local),
                remote.as_str().into(),
            ],
            Self::Remove { remote } => vec!["fs".into(), "rm".into(), remote.as_str().into()],
            Self::Run { file, mount } => {
                let mut args = Vec::new();
                if let Some(dir) = mount {
                    args.push("mount".into());
                    args.push(path(dir));
                }
                args.push("run".into());
                args.push(path(file));
                args
            }
            Self::Exec { code } => vec!["exec".into(), code.clone()],
            Self::Mount { dir } => vec!["mount".into(), path(dir), "repl".into()],
            Self::Unmount => vec!["exec".into(), UNMOUNT_CODE.into()],
            Self::Repl => vec!["resume".into(), "repl".into()],
            Self::SoftReset => vec!["soft-reset".into()],
        }
    }

    /// Whether the command talks to a specific board (and so takes `connect <port>`).
    pub fn targets_port(&self) -> bool {
        !matches!(self, Self::List)
    }

    /// How the process should be wired to the terminal.
    pub fn interaction(&self) -> Interaction {
        match self {
            Self::Run { .. } | Self::Mount { .. } | Self::Repl => Interaction::Attached,
            _ => Interaction::Captured,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Copy { .. } => "copy",
            Self::Remove { .. } => "remove",
            Self::Run { .. } => "run",
            Self::Exec { .. } => "exec",
            Self::Mount { .. } => "mount",
            Self::Unmount => "unmount",
            Self::Repl => "repl",
            Self::SoftReset => "soft-reset",
        }
    }
}

/// Process wiring for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// stdout/stderr captured, bounded by the command timeout.
    Captured,
    /// Inherits the terminal; runs until the user ends it.
    Attached,
}

/// A fully resolved mpremote call, ready for a [`crate::CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// mpremote arguments including the `connect <port>` prefix.
    pub args: Vec<String>,
    /// Terminal wiring.
    pub interaction: Interaction,
    /// Upper bound on run time; `None` for attached sessions.
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Resolve `command` against the current port and timeout.
    pub fn new(command: &DeviceCommand, port: Option<&str>, timeout: Duration) -> Self {
        let mut args = Vec::new();
        if let (true, Some(port)) = (command.targets_port(), port) {
            args.push("connect".to_string());
            args.push(port.to_string());
        }
        args.extend(command.args());

        let interaction = command.interaction();
        let timeout = match interaction {
            Interaction::Captured => Some(timeout),
            Interaction::Attached => None,
        };

        Self {
            args,
            interaction,
            timeout,
        }
    }
}

/// Output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured stdout, empty for attached sessions.
    pub stdout: String,
    /// Captured stderr, empty for attached sessions.
    pub stderr: String,
    /// Wall time spent in the process.
    pub duration: Duration,
}
