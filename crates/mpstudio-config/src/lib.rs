//! # MicroPython Studio configuration
//!
//! Two kinds of configuration live here:
//!
//! - the per-project `device.cfg`, a sectioned `key = value` file that binds a
//!   project to a serial port, a hardware id and a sync folder
//!   ([`ConfigStore`], [`DeviceConfig`]);
//! - the tool-wide `config.toml` with debounce, timeout and mpremote settings
//!   ([`StudioConfig`]).
//!
//! Reading a `device.cfg` that does not exist yet is not an error: lookups
//! return `Ok(None)` so that a fresh project can fall back to defaults.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod device;
pub mod error;
mod store;
mod studio;

pub use device::{DeviceConfig, DEFAULT_SYNC_FOLDER, UNBOUND_DEVICE_ID};
pub use error::{ConfigError, Result};
pub use store::{
    find_value, read_value, set_value, write_value, ConfigStore, DEVICE_CFG_FILE,
    DEVICE_SECTION, FILE_PATH_SECTION,
};
pub use studio::{MpremoteCommand, StudioConfig};
