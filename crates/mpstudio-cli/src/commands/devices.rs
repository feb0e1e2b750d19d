use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use mpstudio_config::DeviceConfig;
use mpstudio_device::{DeviceInfo, DeviceMatch, DevicePrompt};

use super::ProjectOptions;
use crate::cli::OutputFormat;
use crate::prompt::{AcceptFirst, TerminalPrompt};

/// List attached boards
pub async fn execute(options: ProjectOptions, format: OutputFormat) -> Result<()> {
    let session = options.open().await?;
    let bound = DeviceConfig::load(session.store()).await?;
    let devices = session.channel().list().await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&devices).context("Failed to encode devices")?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if devices.is_empty() {
                println!("{}", "No boards found.".yellow());
                return Ok(());
            }
            println!("{}", device_table(&devices, bound.bound_device_id()));
        }
    }
    Ok(())
}

/// Find the project's board and point device.cfg at it
pub async fn refresh(options: ProjectOptions, yes: bool) -> Result<()> {
    let session = options.open().await?;
    let prompt: &dyn DevicePrompt = if yes { &AcceptFirst } else { &TerminalPrompt };

    match session.refresh_device(prompt).await? {
        Some(found) => print_match(&found),
        None => match session.channel().port() {
            Some(port) => println!(
                "{} No matching board found, keeping configured port {}",
                "Warning:".yellow().bold(),
                port
            ),
            None => println!("{} No matching board found", "Warning:".yellow().bold()),
        },
    }
    Ok(())
}

pub(crate) fn print_match(found: &DeviceMatch) {
    let device = found.device();
    let verb = match found {
        DeviceMatch::Known(_) => "Found",
        DeviceMatch::Confirmed(_) => "Bound",
    };
    println!(
        "{} {} board {} on {}",
        verb.green().bold(),
        device.family(),
        device.vidpid,
        device.port
    );
}

fn device_table(devices: &[DeviceInfo], bound_id: Option<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Port", "VID:PID", "Family", "Description", "Project"]);

    for device in devices {
        let is_bound = bound_id.is_some_and(|id| id.eq_ignore_ascii_case(&device.vidpid));
        table.add_row(vec![
            Cell::new(&device.port),
            Cell::new(&device.vidpid),
            Cell::new(device.family()),
            Cell::new(&device.description),
            if is_bound {
                Cell::new("bound").fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]);
    }
    table
}
