//! Glob-based ignore rules for the sync folder.

use crate::error::{Result, WatchError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Drops paths that should never reach the board (bytecode caches, editor
/// swap files, ...). Patterns are matched against the path relative to the
/// sync root. Exact paths can be excluded as well.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: PathBuf,
    set: GlobSet,
    patterns: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl IgnoreFilter {
    /// Compile `patterns` for paths under `root`.
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| WatchError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| WatchError::Pattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            root: root.into(),
            set,
            patterns: patterns.to_vec(),
            excluded: Vec::new(),
        })
    }

    /// A filter that lets everything through.
    pub fn allow_all(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            set: GlobSet::empty(),
            patterns: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Also drop exactly `path`, whatever the patterns say.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Whether `path` is excluded or matches any ignore pattern.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.excluded.iter().any(|excluded| excluded == path) {
            return true;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.set.is_match(relative)
    }

    /// The source patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> IgnoreFilter {
        let patterns: Vec<String> = ["**/__pycache__/**", "**/*.pyc", "**/*~", "**/.*.swp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        IgnoreFilter::new("/p/device_code", &patterns).unwrap()
    }

    #[test]
    fn test_ignores_caches_and_swap_files() {
        let filter = filter();
        assert!(filter.is_ignored(Path::new("/p/device_code/__pycache__/a.cpython-311.pyc")));
        assert!(filter.is_ignored(Path::new("/p/device_code/lib/__pycache__/x")));
        assert!(filter.is_ignored(Path::new("/p/device_code/lib/b.pyc")));
        assert!(filter.is_ignored(Path::new("/p/device_code/main.py~")));
        assert!(filter.is_ignored(Path::new("/p/device_code/.main.py.swp")));
    }

    #[test]
    fn test_keeps_sources() {
        let filter = filter();
        assert!(!filter.is_ignored(Path::new("/p/device_code/main.py")));
        assert!(!filter.is_ignored(Path::new("/p/device_code/lib/sensor.py")));
        assert!(!filter.is_ignored(Path::new("/p/device_code/data.json")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = IgnoreFilter::new("/p", &["a[".to_string()]).unwrap_err();
        assert!(matches!(err, WatchError::Pattern { .. }));
    }

    #[test]
    fn test_excluded_path_is_exact() {
        let filter = IgnoreFilter::allow_all("/p").exclude("/p/device.cfg");
        assert!(filter.is_ignored(Path::new("/p/device.cfg")));
        assert!(!filter.is_ignored(Path::new("/p/lib/device.cfg")));
        assert!(!filter.is_ignored(Path::new("/p/main.py")));
    }

    #[test]
    fn test_allow_all() {
        assert!(!IgnoreFilter::allow_all("/p").is_ignored(Path::new("/p/x.pyc")));
    }
}
