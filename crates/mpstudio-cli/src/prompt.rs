//! Board confirmation prompts.

use dialoguer::{theme::ColorfulTheme, Select};
use mpstudio_device::{DeviceInfo, DevicePrompt, PromptAnswer};
use tracing::warn;

/// Asks on the terminal.
pub struct TerminalPrompt;

impl DevicePrompt for TerminalPrompt {
    fn confirm(&self, device: &DeviceInfo) -> PromptAnswer {
        let question = format!(
            "Use {} board on {} ({}, {})?",
            device.family(),
            device.port,
            device.vidpid,
            describe(device)
        );
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .items(&["Yes", "No", "Skip all"])
            .default(0)
            .interact();

        match choice {
            Ok(index) => answer_for(index),
            Err(e) => {
                warn!(error = %e, "Cannot prompt, skipping device selection");
                PromptAnswer::SkipAll
            }
        }
    }
}

/// Takes the first candidate, for scripts and `--yes`.
pub struct AcceptFirst;

impl DevicePrompt for AcceptFirst {
    fn confirm(&self, _device: &DeviceInfo) -> PromptAnswer {
        PromptAnswer::Yes
    }
}

fn answer_for(index: usize) -> PromptAnswer {
    match index {
        0 => PromptAnswer::Yes,
        1 => PromptAnswer::No,
        _ => PromptAnswer::SkipAll,
    }
}

fn describe(device: &DeviceInfo) -> &str {
    if device.description.is_empty() {
        "no description"
    } else {
        &device.description
    }
}
