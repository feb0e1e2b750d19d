//! Typed view over `device.cfg`.

use crate::error::Result;
use crate::store::{ConfigStore, DEVICE_SECTION, FILE_PATH_SECTION};
use std::path::{Path, PathBuf};

/// Sync folder used when `device.cfg` does not name one.
pub const DEFAULT_SYNC_FOLDER: &str = "device_code";

/// Placeholder the project generator writes when no board was picked.
pub const UNBOUND_DEVICE_ID: &str = "undefined";

/// Device binding of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Serial port, e.g. `COM5` or `/dev/ttyACM0`.
    pub port: Option<String>,
    /// `vid:pid` of the bound board.
    pub device_id: Option<String>,
    /// Sync folder relative to the project directory.
    pub sync_folder: Option<String>,
    /// Timestamp of the last successful sync action.
    pub last_sync: Option<String>,
    /// Firmware flavour recorded at project creation.
    pub firmware: Option<String>,
    /// Absolute sync folder from `[filePath] deviceCodeDir`.
    pub device_code_dir: Option<PathBuf>,
}

impl DeviceConfig {
    /// Load every known key; absent keys stay `None`.
    pub async fn load(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            port: non_empty(store.get(DEVICE_SECTION, "port").await?),
            device_id: non_empty(store.get(DEVICE_SECTION, "deviceId").await?),
            sync_folder: non_empty(store.get(DEVICE_SECTION, "sync_folder").await?),
            last_sync: non_empty(store.get(DEVICE_SECTION, "last_sync").await?),
            firmware: non_empty(store.get(DEVICE_SECTION, "device_firmware").await?),
            device_code_dir: non_empty(store.get(FILE_PATH_SECTION, "deviceCodeDir").await?)
                .map(PathBuf::from),
        })
    }

    /// The hardware id this project is bound to, ignoring placeholders.
    pub fn bound_device_id(&self) -> Option<&str> {
        self.device_id
            .as_deref()
            .filter(|id| !matches!(*id, UNBOUND_DEVICE_ID | "null" | "None"))
    }

    /// Local directory mirrored to the board.
    pub fn sync_root(&self, project_dir: &Path) -> PathBuf {
        if let Some(folder) = &self.sync_folder {
            return project_dir.join(folder);
        }
        if let Some(dir) = &self.device_code_dir {
            return dir.clone();
        }
        project_dir.join(DEFAULT_SYNC_FOLDER)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
