//! Mirror engine: compares two trees by path set and replaces the destination on mismatch

use std::path::{Path, PathBuf};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::snapshot::DirectorySnapshot;

/// Options for the mirror engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorOptions {
    /// Carry access and modification times over to the copies
    pub preserve_times: bool,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self { preserve_times: true }
    }
}

/// What a successful reconcile did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Both trees held the same files, nothing was touched
    NoChange { files: usize },
    /// The destination was deleted and rebuilt from the source
    Mirrored {
        files_copied: usize,
        /// Source files the destination lacked
        missing: usize,
        /// Destination files the source lacked
        extra: usize,
    },
}

impl SyncOutcome {
    pub fn is_mirrored(&self) -> bool {
        matches!(self, SyncOutcome::Mirrored { .. })
    }
}

/// Directories and files to recreate under the destination, relative to the source root.
#[derive(Debug, Default)]
struct CopyPlan {
    directories: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

/// Destructive one-way mirror
#[derive(Debug, Clone, Default)]
pub struct MirrorEngine {
    options: MirrorOptions,
}

impl MirrorEngine {
    pub fn new(options: MirrorOptions) -> Self {
        Self { options }
    }

    /// Make `destination` hold exactly the files of `source`.
    ///
    /// The trees are compared by relative path only. On any difference the destination is
    /// removed and recopied in full. A failure part way through leaves whatever was copied so
    /// far; the next reconcile will see the mismatch and start over.
    #[instrument(skip_all)]
    pub async fn reconcile(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<SyncOutcome> {
        let source = source.as_ref();
        let destination = destination.as_ref();
        debug!("Reconciling '{}' into '{}'", source.display(), destination.display());

        let source_snapshot = DirectorySnapshot::capture(source).await?;

        let destination_exists = fs::try_exists(destination).await.map_err(|e| {
            SyncError::access_error(destination, format!("cannot check existence: {}", e))
        })?;

        let (missing, extra) = if destination_exists {
            let destination_snapshot = DirectorySnapshot::capture(destination).await?;
            if destination_snapshot == source_snapshot {
                debug!("No differences in {} files", source_snapshot.len());
                return Ok(SyncOutcome::NoChange {
                    files: source_snapshot.len(),
                });
            }

            let missing = source_snapshot.missing_from(&destination_snapshot).count();
            let extra = destination_snapshot.missing_from(&source_snapshot).count();
            info!(missing, extra, "Destination differs from source, replacing it");

            self.clear_destination(destination).await?;
            (missing, extra)
        } else {
            warn!("Destination is missing, recreating it");
            (source_snapshot.len(), 0)
        };

        let files_copied = self.copy_tree(source, destination).await?;

        info!(files_copied, "Mirror completed");
        Ok(SyncOutcome::Mirrored {
            files_copied,
            missing,
            extra,
        })
    }

    /// Remove the whole destination tree
    async fn clear_destination(&self, destination: &Path) -> Result<()> {
        fs::remove_dir_all(destination).await.map_err(|e| {
            SyncError::deletion_error(destination, format!("Failed to delete directory: {}", e))
        })
    }

    /// Recreate the source structure under `destination`, returning the number of files copied
    async fn copy_tree(&self, source: &Path, destination: &Path) -> Result<usize> {
        let plan = plan_copy(source).await?;

        fs::create_dir_all(destination).await.map_err(|e| {
            SyncError::path_error(destination, format!("Failed to create directory: {}", e))
        })?;

        for directory in &plan.directories {
            let dir_path = destination.join(directory);
            fs::create_dir_all(&dir_path).await.map_err(|e| {
                SyncError::path_error(&dir_path, format!("Failed to create directory: {}", e))
            })?;
        }

        for file in &plan.files {
            self.copy_file(&source.join(file), &destination.join(file)).await?;
        }

        Ok(plan.files.len())
    }

    /// Copy a single file, carrying its timestamps over when configured
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::copy_error(source, destination, format!("Failed to create parent directory: {}", e))
            })?;
        }

        fs::copy(source, destination).await.map_err(|e| {
            SyncError::copy_error(source, destination, format!("Failed to copy file: {}", e))
        })?;

        if self.options.preserve_times {
            let metadata = fs::metadata(source).await.map_err(|e| {
                SyncError::copy_error(source, destination, format!("Failed to read metadata: {}", e))
            })?;
            let mtime = FileTime::from_last_modification_time(&metadata);
            let atime = FileTime::from_last_access_time(&metadata);
            filetime::set_file_times(destination, atime, mtime).map_err(|e| {
                SyncError::copy_error(source, destination, format!("Failed to set file times: {}", e))
            })?;
        }

        debug!("Copied {} -> {}", source.display(), destination.display());
        Ok(())
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }
}

/// Walk the source on the blocking pool. Entries are classified the same way the snapshot
/// classifies them, so a finished mirror always snapshots equal to its source.
async fn plan_copy(source: &Path) -> Result<CopyPlan> {
    let source = source.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<CopyPlan> {
        let mut plan = CopyPlan::default();

        for entry in WalkDir::new(&source).follow_links(false).min_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&source).to_path_buf();
                SyncError::access_error(path, format!("walk failed: {}", e))
            })?;

            let relative = entry
                .path()
                .strip_prefix(&source)
                .map_err(|e| SyncError::path_error(entry.path(), format!("Failed to create relative path: {}", e)))?
                .to_path_buf();

            let file_type = entry.file_type();
            if file_type.is_dir() {
                plan.directories.push(relative);
            } else if !(file_type.is_symlink() && entry.path().is_dir()) {
                plan.files.push(relative);
            }
        }

        Ok(plan)
    })
    .await
    .map_err(|e| SyncError::Generic(anyhow::anyhow!("copy planning task failed: {}", e)))?
}
