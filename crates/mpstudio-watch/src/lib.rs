//! # Sync folder watching
//!
//! Turns raw file system notifications for a sync folder into a calm stream of
//! "this path has settled, push it or delete it" intents.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ notify       │───▶│ IgnoreFilter │───▶│  SyncQueue   │───▶│ SettledIntent   │
//! │ (recursive)  │    │ (globset)    │    │ (per-path    │    │ receiver        │
//! └──────────────┘    └──────────────┘    │  debounce)   │    └─────────────────┘
//!                                         └──────────────┘
//! ```
//!
//! A burst of events on one path inside the quiet period yields exactly one
//! intent, carrying the kind of the last event.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
mod events;
mod filter;
mod queue;
mod watcher;

pub use error::{Result, WatchError};
pub use events::{FileEvent, FileEventKind, SettledIntent, SyncKind};
pub use filter::IgnoreFilter;
pub use queue::SyncQueue;
pub use watcher::{map_notify_event, SyncWatcher};
