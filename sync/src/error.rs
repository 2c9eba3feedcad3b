//! Error types for the mirror engine

use std::path::PathBuf;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for mirror operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Path-related errors
    #[error("Path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// A directory tree could not be walked
    #[error("Cannot access '{path}': {message}")]
    Access { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error: {message}")]
    FileCopy {
        message: String,
    },

    /// File deletion errors
    #[error("File deletion error at '{path}': {message}")]
    FileDeletion { path: PathBuf, message: String },

    /// The background task could not be launched
    #[error("Failed to start sync worker: {0}")]
    WorkerStart(String),

    /// A session is already running on this worker
    #[error("A sync session is already running")]
    AlreadyRunning,

    /// Generic errors with context
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl SyncError {
    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new access error
    pub fn access_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Access {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(
        source: impl AsRef<std::path::Path>,
        dest: impl AsRef<std::path::Path>,
        message: impl Into<String>,
    ) -> Self {
        let full_message = format!(
            "File copy error from '{}' to '{}': {}",
            source.as_ref().display(),
            dest.as_ref().display(),
            message.into()
        );
        Self::FileCopy {
            message: full_message,
        }
    }

    /// Create a new file deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileDeletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the filesystem rather than from session bookkeeping.
    pub fn is_access_failure(&self) -> bool {
        matches!(
            self,
            Self::Path { .. }
                | Self::Access { .. }
                | Self::FileCopy { .. }
                | Self::FileDeletion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_error_message_names_both_paths() {
        let err = SyncError::copy_error("/src/a.txt", "/dst/a.txt", "disk full");
        let text = err.to_string();
        assert!(text.contains("/src/a.txt"));
        assert!(text.contains("/dst/a.txt"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_access_failure_classification() {
        assert!(SyncError::access_error("/x", "gone").is_access_failure());
        assert!(SyncError::deletion_error("/x", "locked").is_access_failure());
        assert!(!SyncError::AlreadyRunning.is_access_failure());
        assert!(!SyncError::WorkerStart("no runtime".into()).is_access_failure());
    }
}
