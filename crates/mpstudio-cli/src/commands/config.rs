use anyhow::{bail, Context, Result};
use colored::Colorize;

use super::ProjectOptions;
use crate::cli::ConfigCommands;

/// Execute config subcommand
pub async fn execute(options: ProjectOptions, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Get { section, key } => get(options, section, key).await,
        ConfigCommands::Set {
            section,
            key,
            value,
        } => set(options, section, key, value).await,
    }
}

async fn get(options: ProjectOptions, section: String, key: String) -> Result<()> {
    let store = options.store().await?;
    match store
        .get(&section, &key)
        .await
        .with_context(|| format!("Failed to read {}", store.path().display()))?
    {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => bail!("{}.{} is not set in {}", section, key, store.path().display()),
    }
}

async fn set(options: ProjectOptions, section: String, key: String, value: String) -> Result<()> {
    let store = options.store().await?;
    store
        .set(&section, &key, &value)
        .await
        .with_context(|| format!("Failed to write {}", store.path().display()))?;
    println!(
        "{} {}.{} = {}",
        "Set".green().bold(),
        section,
        key,
        value.yellow()
    );
    Ok(())
}
