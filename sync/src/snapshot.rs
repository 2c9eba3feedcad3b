//! Structural fingerprint of a directory tree: the set of file paths relative to its root

use std::collections::BTreeSet;
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// Set of files found under a root, each path relative to that root with `/` separators.
/// Two snapshots taken from different roots compare equal when they hold the same files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    files: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// Walk `root` recursively and record every non-directory entry.
    ///
    /// Symlinks are not followed. A link that does not resolve to a directory counts as a
    /// file, a link to a directory is skipped. Empty directories leave no trace.
    pub fn build(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.is_dir() {
            return Err(SyncError::access_error(root, "directory does not exist"));
        }

        let mut files = BTreeSet::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                SyncError::access_error(path, format!("walk failed: {}", e))
            })?;

            let file_type = entry.file_type();
            if file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir()) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|e| {
                SyncError::path_error(entry.path(), format!("Failed to create relative path: {}", e))
            })?;

            files.insert(to_relative_key(relative));
        }

        Ok(Self { files })
    }

    /// Same as [`DirectorySnapshot::build`] but runs the walk on the blocking pool.
    pub async fn capture(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::build(root))
            .await
            .map_err(|e| SyncError::Generic(anyhow::anyhow!("snapshot task failed: {}", e)))?
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.files.contains(relative)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths present here but missing from `other`.
    pub fn missing_from<'a>(&'a self, other: &'a DirectorySnapshot) -> impl Iterator<Item = &'a str> {
        self.files.difference(&other.files).map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn to_relative_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
