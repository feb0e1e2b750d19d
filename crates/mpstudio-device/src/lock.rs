//! Cross-process port locks.
//!
//! Every `mps` invocation runs its own [`DeviceChannel`](crate::DeviceChannel),
//! so a `mps sync` in one terminal and a `mps exec` in another would each
//! think they own the serial line. Before a board command runs, the channel
//! worker takes an exclusive advisory lock on a file named after the port and
//! holds it until the mpremote process exits.

use crate::error::{DeviceError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lock file used when mpremote picks the board itself.
const AUTO_PORT: &str = "auto";

/// Directory of per-port lock files shared by every process on the machine.
#[derive(Debug, Clone)]
pub struct PortLocks {
    dir: PathBuf,
}

impl PortLocks {
    /// Locks stored under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<tmp>/mpstudio-locks`, the directory every `mps` process agrees on.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("mpstudio-locks")
    }

    /// Directory holding the lock files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock file for `port`.
    pub fn lock_path(&self, port: Option<&str>) -> PathBuf {
        let name: String = port
            .unwrap_or(AUTO_PORT)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let name = name.trim_matches('_');
        let name = if name.is_empty() { AUTO_PORT } else { name };
        self.dir.join(format!("{}.lock", name))
    }

    /// Wait until no other process holds `port`, then hold it until the guard
    /// is dropped.
    pub async fn acquire(&self, port: Option<&str>) -> Result<PortGuard> {
        let path = self.lock_path(port);
        let file = open_lock_file(&self.dir, &path)?;

        if file.try_lock_exclusive().is_ok() {
            debug!(lock = %path.display(), "Acquired port lock");
            return Ok(PortGuard { file, path });
        }

        info!(port = ?port, lock = %path.display(), "Port is busy in another process, waiting");
        let blocking_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            file.lock_exclusive().map(|()| file).map_err(|source| DeviceError::Lock {
                path: blocking_path,
                source,
            })
        })
        .await
        .map_err(|e| DeviceError::Lock {
            path: path.clone(),
            source: std::io::Error::other(e),
        })??;

        debug!(lock = %path.display(), "Acquired port lock after waiting");
        Ok(PortGuard { file, path })
    }
}

fn open_lock_file(dir: &Path, path: &Path) -> Result<File> {
    let lock_error = |source: std::io::Error| DeviceError::Lock {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(lock_error)?;
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(lock_error)
}

/// Exclusive hold on one port; released on drop.
#[derive(Debug)]
pub struct PortGuard {
    file: File,
    path: PathBuf,
}

impl PortGuard {
    /// The lock file held.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release port lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_a_plain_file_name() {
        let locks = PortLocks::new("/locks");
        assert_eq!(locks.lock_path(Some("COM5")), PathBuf::from("/locks/COM5.lock"));
        assert_eq!(
            locks.lock_path(Some("/dev/ttyACM0")),
            PathBuf::from("/locks/dev_ttyACM0.lock")
        );
        assert_eq!(locks.lock_path(None), PathBuf::from("/locks/auto.lock"));
        assert_eq!(locks.lock_path(Some("//")), PathBuf::from("/locks/auto.lock"));
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let first = PortLocks::new(temp.path());
        let second = PortLocks::new(temp.path());

        let guard = first.acquire(Some("COM5")).await.unwrap();
        assert!(guard.path().exists());

        let waiting = tokio::time::timeout(Duration::from_millis(100), second.acquire(Some("COM5"))).await;
        assert!(waiting.is_err(), "lock was granted while still held");

        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_secs(5), second.acquire(Some("COM5")))
            .await
            .expect("lock not released")
            .unwrap();
        drop(reacquired);
    }

    #[tokio::test]
    async fn test_different_ports_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let locks = PortLocks::new(temp.path());

        let com5 = locks.acquire(Some("COM5")).await.unwrap();
        let com6 = tokio::time::timeout(Duration::from_secs(1), locks.acquire(Some("COM6")))
            .await
            .expect("COM6 blocked on COM5")
            .unwrap();
        drop((com5, com6));
    }
}
