//! # Device command channel
//!
//! A MicroPython board hangs off a single serial line that can only carry one
//! mpremote session at a time. Everything that talks to the board (syncing,
//! running scripts, the REPL, discovery) goes through one [`DeviceChannel`],
//! an actor that executes [`DeviceCommand`]s strictly one after another in
//! submission order.
//!
//! ```text
//! submit() ──▶ mpsc inbox ──▶ worker ──▶ CommandRunner (mpremote) ──▶ oneshot reply
//! ```
//!
//! Channels in different processes (a `mps sync` next to a `mps repl`) are
//! kept apart by a per-port advisory file lock, see [`PortLocks`].
//!
//! The process boundary sits behind the [`CommandRunner`] trait so the channel
//! can be driven by a scripted runner in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod channel;
mod command;
mod discovery;
pub mod error;
mod lock;
mod runner;

pub use channel::{ChannelConfig, CommandTicket, DeviceChannel};
pub use command::{CommandOutput, DeviceCommand, DevicePath, Interaction, Invocation};
pub use discovery::{
    match_device, parse_device_list, DeviceInfo, DeviceMatch, DevicePrompt, McuFamily,
    PromptAnswer, PLACEHOLDER_VIDPID,
};
pub use error::{DeviceError, Result};
pub use lock::{PortGuard, PortLocks};
pub use runner::{CommandRunner, MpremoteRunner};
