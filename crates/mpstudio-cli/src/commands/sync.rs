use anyhow::{Context, Result};
use colored::Colorize;
use mpstudio_device::{DevicePath, DevicePrompt};
use mpstudio_sync::device_path_for;
use std::path::PathBuf;
use tracing::info;

use super::ProjectOptions;
use crate::commands::devices::print_match;
use crate::prompt::{AcceptFirst, TerminalPrompt};

/// Mirror the sync folder to the board until Ctrl-C
pub async fn execute(options: ProjectOptions, yes: bool) -> Result<()> {
    let mut session = options.open().await?;
    let prompt: &dyn DevicePrompt = if yes { &AcceptFirst } else { &TerminalPrompt };

    if let Some(found) = session.refresh_device(prompt).await? {
        print_match(&found);
    }
    session.start().await.context("Failed to start auto-sync")?;

    println!(
        "{} {} (Ctrl-C to stop)",
        "Syncing".green().bold(),
        session.sync_root().display()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!(pending = session.pending_changes(), "Stopping auto-sync");
    if let Some(stats) = session.disable().await {
        println!(
            "{} {} copied, {} removed, {} failed",
            "Stopped:".bold(),
            stats.copied,
            stats.removed,
            stats.failed
        );
    }
    Ok(())
}

/// Copy one file from the sync folder to the board
pub async fn push(options: ProjectOptions, file: PathBuf) -> Result<()> {
    let session = options.open().await?;
    let local = tokio::fs::canonicalize(&file)
        .await
        .with_context(|| format!("File not found: {}", file.display()))?;
    let root = tokio::fs::canonicalize(session.sync_root())
        .await
        .with_context(|| format!("Sync folder not found: {}", session.sync_root().display()))?;
    let remote = device_path_for(&root, &local)?;

    session.channel().copy_to_device(&local, &remote).await?;
    session
        .store()
        .touch_last_sync()
        .await
        .context("Failed to record last sync time")?;
    println!("{} {} -> {}", "Copied".green().bold(), file.display(), remote);
    Ok(())
}

/// Remove a file from the board
pub async fn remove(options: ProjectOptions, device_path: String) -> Result<()> {
    let session = options.open().await?;
    let remote = DevicePath::parse(&device_path);

    session.channel().remove_from_device(&remote).await?;
    println!("{} {}", "Removed".green().bold(), remote);
    Ok(())
}
