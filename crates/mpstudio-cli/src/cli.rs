use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table
    #[default]
    Table,
    /// JSON array
    Json,
}

#[derive(Parser)]
#[command(name = "mps")]
#[command(about = "mps - MicroPython Studio - keep a board in sync with your project")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory containing device.cfg (defaults to the current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Tool config file (defaults to ~/.config/mpstudio/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// mpremote executable (overrides the config file)
    #[arg(long, global = true, env = "MPSTUDIO_MPREMOTE")]
    pub mpremote: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List attached boards
    Devices {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Find the project's board and record its port in device.cfg
    Refresh {
        /// Accept the first candidate board without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Watch the sync folder and mirror every change to the board until Ctrl-C
    Sync {
        /// Accept the first candidate board without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy one file from the sync folder to the board
    Push {
        /// File inside the sync folder
        file: PathBuf,
    },

    /// Remove a file from the board
    Rm {
        /// Path on the board, e.g. `lib/sensor.py` or `:lib/sensor.py`
        device_path: String,
    },

    /// Run a script on the board
    ///
    /// By default the sync folder is mounted as /remote first, so imports of
    /// project modules resolve without copying them.
    Run {
        /// Script to run (defaults to main.py in the sync folder)
        file: Option<PathBuf>,

        /// Do not mount the sync folder
        #[arg(long)]
        no_mount: bool,
    },

    /// Execute a Python snippet on the board
    Exec {
        /// Source code
        code: String,
    },

    /// Mount the sync folder as /remote and open a REPL
    Mount,

    /// Unmount /remote
    Unmount,

    /// Open the board's REPL
    Repl,

    /// Soft-reset the board
    Reset,

    /// Read or write device.cfg
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a value
    Get {
        /// Section, e.g. `device`
        section: String,
        /// Key, e.g. `port`
        key: String,
    },

    /// Set a value, creating device.cfg if needed
    Set {
        /// Section, e.g. `device`
        section: String,
        /// Key, e.g. `port`
        key: String,
        /// New value
        value: String,
    },
}
