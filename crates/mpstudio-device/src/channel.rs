//! Single-flight command channel.
//!
//! All device commands are funnelled through one worker task, so at most one
//! mpremote process per channel owns the serial line. With [`PortLocks`]
//! configured the worker also holds the port's lock file while a command runs,
//! which extends that to every channel on the machine. Callers get a
//! [`CommandTicket`] that resolves with the result of their own command.

use crate::command::{CommandOutput, DeviceCommand, DevicePath, Invocation};
use crate::discovery::{parse_device_list, DeviceInfo};
use crate::error::{DeviceError, Result};
use crate::lock::PortLocks;
use crate::runner::CommandRunner;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// stderr lines that are expected noise from mpremote.
const STDERR_NOISE: &[&str] = &["No device found", "could not open port", "Warning:"];

/// Settings for a [`DeviceChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bound on every captured command.
    pub command_timeout: Duration,
    /// Initial port; `None` lets mpremote pick the first board.
    pub port: Option<String>,
    /// Cross-process port locks; `None` serializes within this channel only.
    pub locks: Option<PortLocks>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            port: None,
            locks: None,
        }
    }
}

/// A command waiting in the inbox, with the channel to answer on.
struct QueuedCommand {
    id: u64,
    command: DeviceCommand,
    invocation: Invocation,
    port: Option<String>,
    reply: oneshot::Sender<Result<CommandOutput>>,
    queued_at: Instant,
}

struct Shared {
    port: RwLock<Option<String>>,
    command_timeout: Duration,
    locks: Option<PortLocks>,
    busy: AtomicBool,
    depth: AtomicUsize,
    next_id: AtomicU64,
}

/// Handle to the device channel. Cheap to clone; all clones share one worker.
#[derive(Clone)]
pub struct DeviceChannel {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    shared: Arc<Shared>,
}

impl DeviceChannel {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(runner: Arc<dyn CommandRunner>, config: ChannelConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            port: RwLock::new(config.port),
            command_timeout: config.command_timeout,
            locks: config.locks,
            busy: AtomicBool::new(false),
            depth: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        });

        tokio::spawn(run_worker(runner, Arc::clone(&shared), receiver));
        Self { sender, shared }
    }

    /// Current port.
    pub fn port(&self) -> Option<String> {
        self.shared
            .port
            .read()
            .map(|port| port.clone())
            .unwrap_or_default()
    }

    /// Point subsequent commands at another port. Queued commands keep theirs.
    pub fn set_port(&self, port: Option<String>) {
        if let Ok(mut current) = self.shared.port.write() {
            info!(port = ?port, "Device port set");
            *current = port;
        }
    }

    /// Whether a command is executing right now.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    /// Commands waiting behind the one in flight.
    pub fn queue_depth(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }

    /// Append `command` to the queue and return a ticket for its result.
    ///
    /// Submission order is execution order.
    pub fn submit(&self, command: DeviceCommand) -> CommandTicket {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let port = self.port();
        let invocation = Invocation::new(&command, port.as_deref(), self.shared.command_timeout);
        let (reply, receiver) = oneshot::channel();
        let name = command.name();

        self.shared.depth.fetch_add(1, Ordering::SeqCst);
        let queued = QueuedCommand {
            id,
            command,
            invocation,
            port,
            reply,
            queued_at: Instant::now(),
        };
        if self.sender.send(queued).is_err() {
            // The dropped reply sender resolves the ticket as ChannelClosed.
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            warn!(id, command = name, "Device channel is closed");
        } else {
            debug!(id, command = name, "Queued device command");
        }

        CommandTicket { id, receiver }
    }

    /// Submit and wait for the result.
    pub async fn enqueue(&self, command: DeviceCommand) -> Result<CommandOutput> {
        self.submit(command).await
    }

    /// Boards currently attached. Any failure reads as "no boards".
    pub async fn list(&self) -> Vec<DeviceInfo> {
        match self.enqueue(DeviceCommand::List).await {
            Ok(output) => parse_device_list(&output.stdout),
            Err(e) => {
                warn!(error = %e, "Device discovery failed");
                Vec::new()
            }
        }
    }

    /// Copy `local` to `remote`.
    pub async fn copy_to_device(&self, local: &Path, remote: &DevicePath) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Copy {
            local: local.to_path_buf(),
            remote: remote.clone(),
        })
        .await
    }

    /// Delete `remote`.
    pub async fn remove_from_device(&self, remote: &DevicePath) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Remove {
            remote: remote.clone(),
        })
        .await
    }

    /// Run a script, optionally mounting a folder as `/remote` first.
    pub async fn run_file(&self, file: &Path, mount: Option<&Path>) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Run {
            file: file.to_path_buf(),
            mount: mount.map(Path::to_path_buf),
        })
        .await
    }

    /// Execute a snippet.
    pub async fn exec(&self, code: impl Into<String>) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Exec { code: code.into() }).await
    }

    /// Mount `dir` as `/remote` and attach a REPL.
    pub async fn mount(&self, dir: &Path) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Mount {
            dir: dir.to_path_buf(),
        })
        .await
    }

    /// Unmount `/remote`; an already unmounted board counts as success.
    pub async fn unmount(&self) -> Result<CommandOutput> {
        match self.enqueue(DeviceCommand::Unmount).await {
            Err(DeviceError::Command { message, .. })
                if message.contains("ENODEV") || message.to_lowercase().contains("not mounted") =>
            {
                info!("Already unmounted");
                Ok(CommandOutput::default())
            }
            other => other,
        }
    }

    /// Attach to the REPL.
    pub async fn repl(&self) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::Repl).await
    }

    /// Soft-reset the board.
    pub async fn soft_reset(&self) -> Result<CommandOutput> {
        self.enqueue(DeviceCommand::SoftReset).await
    }
}

/// Pending result of one submitted command.
#[derive(Debug)]
pub struct CommandTicket {
    id: u64,
    receiver: oneshot::Receiver<Result<CommandOutput>>,
}

impl CommandTicket {
    /// Sequence number assigned at submission.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for CommandTicket {
    type Output = Result<CommandOutput>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|reply| reply.unwrap_or_else(|_| Err(DeviceError::ChannelClosed)))
    }
}

async fn run_worker(
    runner: Arc<dyn CommandRunner>,
    shared: Arc<Shared>,
    mut receiver: mpsc::UnboundedReceiver<QueuedCommand>,
) {
    while let Some(queued) = receiver.recv().await {
        shared.depth.fetch_sub(1, Ordering::SeqCst);
        shared.busy.store(true, Ordering::SeqCst);

        let name = queued.command.name();
        debug!(
            id = queued.id,
            command = name,
            waited_ms = queued.queued_at.elapsed().as_millis() as u64,
            "Executing device command"
        );

        let result = execute(runner.as_ref(), shared.locks.as_ref(), &queued).await;
        shared.busy.store(false, Ordering::SeqCst);

        match &result {
            Ok(output) => {
                log_stderr_noise(&output.stderr);
                debug!(
                    id = queued.id,
                    command = name,
                    elapsed_ms = output.duration.as_millis() as u64,
                    "Device command completed"
                );
            }
            Err(e) => debug!(id = queued.id, command = name, error = %e, "Device command failed"),
        }

        if queued.reply.send(result).is_err() {
            debug!(id = queued.id, "Caller stopped waiting for device command");
        }
    }

    debug!("Device channel worker stopped");
}

/// Run one command, holding its port's lock for the lifetime of the process.
async fn execute(
    runner: &dyn CommandRunner,
    locks: Option<&PortLocks>,
    queued: &QueuedCommand,
) -> Result<CommandOutput> {
    let _guard = match locks {
        Some(locks) if queued.command.targets_port() => {
            Some(locks.acquire(queued.port.as_deref()).await?)
        }
        _ => None,
    };
    runner.run(&queued.invocation).await
}

fn log_stderr_noise(stderr: &str) {
    let relevant: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !STDERR_NOISE.iter().any(|noise| line.contains(noise)))
        .collect();
    if !relevant.is_empty() {
        warn!(stderr = %relevant.join("\n"), "mpremote wrote to stderr");
    }
}
