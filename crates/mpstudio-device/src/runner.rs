//! Process execution behind the device channel.

use crate::command::{CommandOutput, Interaction, Invocation};
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use mpstudio_config::MpremoteCommand;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Executes one resolved mpremote invocation.
///
/// Implementations must not be called concurrently for the same board;
/// [`crate::DeviceChannel`] guarantees that.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Non-zero exits are returned as classified errors.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs the real mpremote executable.
#[derive(Debug, Clone)]
pub struct MpremoteRunner {
    command: MpremoteCommand,
}

impl MpremoteRunner {
    /// Runner for the given mpremote launcher.
    pub fn new(command: MpremoteCommand) -> Self {
        Self { command }
    }

    fn build(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .args(&invocation.args)
            .kill_on_drop(true);

        match invocation.interaction {
            Interaction::Captured => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            Interaction::Attached => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> DeviceError {
        DeviceError::Spawn {
            program: self.command.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for MpremoteRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(
            program = %self.command.program.display(),
            args = ?invocation.args,
            "Spawning mpremote"
        );
        let started = Instant::now();
        let mut cmd = self.build(invocation);

        match invocation.interaction {
            Interaction::Captured => {
                let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
                // Dropping the future on timeout drops the child, which kills it.
                let wait = child.wait_with_output();
                let output = match invocation.timeout {
                    Some(limit) => tokio::time::timeout(limit, wait)
                        .await
                        .map_err(|_| DeviceError::Timeout(limit))??,
                    None => wait.await?,
                };

                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if !output.status.success() {
                    return Err(DeviceError::from_failure(
                        output.status.code(),
                        &stderr,
                        &stdout,
                    ));
                }

                Ok(CommandOutput {
                    stdout,
                    stderr,
                    duration: started.elapsed(),
                })
            }
            Interaction::Attached => {
                let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
                let status = child.wait().await?;
                if !status.success() {
                    return Err(DeviceError::from_failure(status.code(), "", ""));
                }

                Ok(CommandOutput {
                    duration: started.elapsed(),
                    ..Default::default()
                })
            }
        }
    }
}
