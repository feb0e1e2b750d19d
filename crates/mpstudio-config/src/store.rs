//! Sectioned `key = value` store backing `device.cfg`.
//!
//! The format is deliberately loose: lines are matched one at a time, comments
//! start with `;` or `#`, and anything that does not look like a header or a
//! key line is carried through untouched. Writes rewrite only the one line
//! they own.

use crate::error::{ConfigError, Result};
use chrono::{SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the per-project device configuration.
pub const DEVICE_CFG_FILE: &str = "device.cfg";

/// Section holding port, hardware id and sync folder.
pub const DEVICE_SECTION: &str = "device";

/// Section holding absolute paths.
pub const FILE_PATH_SECTION: &str = "filePath";

/// Read `key` from `[section]` in the file at `path`.
///
/// Returns `Ok(None)` when the file, the section or the key does not exist.
pub async fn read_value(
    path: impl AsRef<Path>,
    section: &str,
    key: &str,
) -> Result<Option<String>> {
    let path = path.as_ref();
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file does not exist yet");
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::io(path, e)),
    };

    let value = find_value(&text, section, key);
    if value.is_none() {
        debug!(section, key, "Key not found in config");
    }
    Ok(value)
}

/// Set `key` in `[section]` of the file at `path`, creating the file if needed.
pub async fn write_value(
    path: impl AsRef<Path>,
    section: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let path = path.as_ref();
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfigError::io(path, e)),
    };

    let updated = set_value(&text, section, key, value);
    tokio::fs::write(path, updated)
        .await
        .map_err(|e| ConfigError::io(path, e))?;

    info!(path = %path.display(), section, key, value, "Updated config");
    Ok(())
}

/// Look up `key` in `[section]` of an in-memory config text.
///
/// Only the first match is returned; duplicates further down are ignored.
pub fn find_value(text: &str, section: &str, key: &str) -> Option<String> {
    let mut in_section = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }

        if let Some(name) = section_name(trimmed) {
            in_section = name == section;
            continue;
        }

        if in_section {
            if let Some(raw) = key_value(trimmed, key) {
                return Some(unquote(raw.trim()).to_string());
            }
        }
    }

    None
}

/// Return `text` with `key` in `[section]` set to `value`.
///
/// Replaces the first existing `key = ...` line of the first matching section,
/// otherwise appends the key to the end of that section's block, otherwise
/// appends a new section at end of file. Every other line is kept as is.
pub fn set_value(text: &str, section: &str, key: &str, value: &str) -> String {
    let new_line = format!("{} = \"{}\"", key, value);
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();

    let mut in_section = false;
    let mut header: Option<usize> = None;
    let mut block_end: Option<usize> = None;
    let mut replaced = false;

    for (index, line) in lines.iter_mut().enumerate() {
        let trimmed = line.trim();

        if let Some(name) = section_name(trimmed) {
            if header.is_some() && block_end.is_none() {
                block_end = Some(index);
            }
            in_section = name == section;
            if in_section && header.is_none() {
                header = Some(index);
            }
            continue;
        }

        if in_section && !is_comment(trimmed) && key_value(trimmed, key).is_some() {
            *line = new_line.clone();
            replaced = true;
            break;
        }
    }

    if !replaced {
        match header {
            Some(header) => {
                let end = block_end.unwrap_or(lines.len());
                let insert_at = (header + 1..end)
                    .rev()
                    .find(|&i| !lines[i].trim().is_empty())
                    .map_or(header + 1, |i| i + 1);
                lines.insert(insert_at, new_line);
            }
            None => {
                lines.push(format!("[{}]", section));
                lines.push(new_line);
            }
        }
    }

    let mut out = lines.join("\n");
    if text.is_empty() || text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with(';') || trimmed.starts_with('#')
}

/// `[name]` on a trimmed line.
fn section_name(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() || inner.contains(']') {
        return None;
    }
    Some(inner)
}

/// The raw value of `key = value` on a trimmed line, if `key` matches literally.
fn key_value<'a>(trimmed: &'a str, key: &str) -> Option<&'a str> {
    trimmed
        .strip_prefix(key)?
        .trim_start()
        .strip_prefix('=')
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Handle to one project's `device.cfg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `<project_dir>/device.cfg`.
    pub fn for_project(project_dir: impl AsRef<Path>) -> Self {
        Self::new(project_dir.as_ref().join(DEVICE_CFG_FILE))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read a value, `None` if absent.
    pub async fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        read_value(&self.path, section, key).await
    }

    /// Write a value.
    pub async fn set(&self, section: &str, key: &str, value: &str) -> Result<()> {
        write_value(&self.path, section, key, value).await
    }

    /// Persist a (re)detected device.
    pub async fn record_device(&self, port: &str, device_id: &str) -> Result<()> {
        self.set(DEVICE_SECTION, "deviceId", device_id).await?;
        self.set(DEVICE_SECTION, "port", port).await
    }

    /// Stamp `last_sync` with the current time.
    pub async fn touch_last_sync(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.set(DEVICE_SECTION, "last_sync", &now).await
    }
}
