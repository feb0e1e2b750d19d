//! Mapping local paths to paths on the board.

use crate::error::{Result, SyncError};
use mpstudio_device::DevicePath;
use std::path::{Component, Path};

/// The board path for `path`, relative to `root` and `/` separated.
///
/// `root/lib/sensor.py` becomes `:lib/sensor.py`. The root itself and paths
/// outside it have no board counterpart.
pub fn device_path_for(root: &Path, path: &Path) -> Result<DevicePath> {
    let outside = || SyncError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let relative = path.strip_prefix(root).map_err(|_| outside())?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    if parts.is_empty() {
        return Err(outside());
    }

    Ok(DevicePath::from_relative(&parts.join("/")))
}
