//! # Project sync
//!
//! Glue between a project's sync folder and its board. A [`SyncSession`]
//! owns the project's `device.cfg`, its [`mpstudio_device::DeviceChannel`]
//! and, while auto-sync is on, the watcher and debounce queue. Settled
//! changes are handed to a [`SyncOrchestrator`], which turns them into
//! `fs cp` / `fs rm` commands.
//!
//! ```text
//! SyncWatcher ─▶ SyncQueue ─▶ SyncOrchestrator ─▶ DeviceChannel ─▶ mpremote
//!                                   │
//!                                   └─▶ last_sync in device.cfg
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
mod orchestrator;
mod paths;
mod session;

pub use error::{Result, SyncError};
pub use orchestrator::{SyncOrchestrator, SyncStats};
pub use paths::device_path_for;
pub use session::{refresh_device, SyncSession};
