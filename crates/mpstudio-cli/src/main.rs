use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mpstudio_cli::{
    cli::{Cli, Commands},
    commands::{self, ProjectOptions},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    let log_level = if cli.verbose { "debug" } else { "info" };
    let default_filter = format!(
        "mps={level},mpstudio_cli={level},mpstudio_sync={level},mpstudio_device={level},mpstudio_watch={level},mpstudio_config={level}",
        level = log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = ProjectOptions::from_cli(&cli);

    match cli.command {
        Commands::Devices { format } => commands::devices::execute(options, format).await?,
        Commands::Refresh { yes } => commands::devices::refresh(options, yes).await?,
        Commands::Sync { yes } => commands::sync::execute(options, yes).await?,
        Commands::Push { file } => commands::sync::push(options, file).await?,
        Commands::Rm { device_path } => commands::sync::remove(options, device_path).await?,
        Commands::Run { file, no_mount } => commands::device::run(options, file, no_mount).await?,
        Commands::Exec { code } => commands::device::exec(options, code).await?,
        Commands::Mount => commands::device::mount(options).await?,
        Commands::Unmount => commands::device::unmount(options).await?,
        Commands::Repl => commands::device::repl(options).await?,
        Commands::Reset => commands::device::reset(options).await?,
        Commands::Config(cmd) => commands::config::execute(options, cmd).await?,
    }

    Ok(())
}
