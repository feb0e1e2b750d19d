use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use super::ProjectOptions;

const EXIT_HINT: &str = "Ctrl-] or Ctrl-X to leave";

/// Run a script, mounting the sync folder unless told not to
pub async fn run(options: ProjectOptions, file: Option<PathBuf>, no_mount: bool) -> Result<()> {
    let session = options.open().await?;
    let file = match file {
        Some(file) => file,
        None => session.sync_root().join("main.py"),
    };
    let file = tokio::fs::canonicalize(&file)
        .await
        .with_context(|| format!("Script not found: {}", file.display()))?;
    let mount = (!no_mount).then(|| session.sync_root().to_path_buf());

    println!("{} {} ({})", "Running".green().bold(), file.display(), EXIT_HINT.dimmed());
    session.channel().run_file(&file, mount.as_deref()).await?;
    Ok(())
}

/// Execute a snippet and print its output
pub async fn exec(options: ProjectOptions, code: String) -> Result<()> {
    let session = options.open().await?;
    let output = session.channel().exec(code).await?;
    print!("{}", output.stdout);
    Ok(())
}

/// Mount the sync folder and open a REPL
pub async fn mount(options: ProjectOptions) -> Result<()> {
    let session = options.open().await?;
    println!(
        "{} {} as /remote ({})",
        "Mounting".green().bold(),
        session.sync_root().display(),
        EXIT_HINT.dimmed()
    );
    session.channel().mount(session.sync_root()).await?;
    Ok(())
}

pub async fn unmount(options: ProjectOptions) -> Result<()> {
    let session = options.open().await?;
    session.channel().unmount().await?;
    println!("{} /remote", "Unmounted".green().bold());
    Ok(())
}

pub async fn repl(options: ProjectOptions) -> Result<()> {
    let session = options.open().await?;
    println!("{} ({})", "REPL".green().bold(), EXIT_HINT.dimmed());
    session.channel().repl().await?;
    Ok(())
}

pub async fn reset(options: ProjectOptions) -> Result<()> {
    let session = options.open().await?;
    session.channel().soft_reset().await?;
    println!("{}", "Board reset".green().bold());
    Ok(())
}
