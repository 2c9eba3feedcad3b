//! Mirror Engine Library
//!
//! Keeps a destination directory identical to a source directory by periodically comparing
//! the two trees and replacing the destination whenever they differ:
//! - Guardrails that refuse system directories and flag unlikely save folders
//! - Path-set snapshots of directory trees
//! - Destructive delete-and-recopy mirroring
//! - A cancellable background loop reporting to a drainable event queue
//! - A controller façade tying the pieces together

pub mod validator;
pub mod target;
pub mod snapshot;
pub mod mirror;
pub mod events;
pub mod worker;
pub mod controller;
pub mod error;

// Re-export main types and functions
pub use validator::{
    directory_verdict, NormalizedPath, PathStyle, PathValidator, ProtectedRoot, RootScope,
    ValidationVerdict, DEFAULT_SAVE_MARKERS,
};
pub use target::{PathRole, SavedPaths, SyncTarget};
pub use snapshot::DirectorySnapshot;
pub use mirror::{MirrorEngine, MirrorOptions, SyncOutcome};
pub use events::{EventQueue, LogEvent, LogLevel};
pub use worker::{SyncSession, SyncWorker, WorkerState};
pub use controller::{ControllerOptions, StartError, SyncController, TargetStore, DEFAULT_INTERVAL};
pub use error::{SyncError, Result};

/// Run a single reconcile between two directories
pub async fn mirror_once(
    source: impl AsRef<std::path::Path>,
    destination: impl AsRef<std::path::Path>,
) -> Result<SyncOutcome> {
    MirrorEngine::default().reconcile(source, destination).await
}

/// Take a snapshot of a directory tree
pub async fn snapshot_directory(path: impl AsRef<std::path::Path>) -> Result<DirectorySnapshot> {
    DirectorySnapshot::capture(path).await
}

#[cfg(test)]
mod mirror_tests;
