//! The source/destination pair a sync session operates on

use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Which side of a target a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathRole {
    Source,
    Destination,
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRole::Source => write!(f, "source"),
            PathRole::Destination => write!(f, "destination"),
        }
    }
}

/// An accepted `(source, destination)` pair. Only the controller builds these after the
/// guardrails pass, so holders can rely on the destination not being a system directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    source: PathBuf,
    destination: PathBuf,
}

impl SyncTarget {
    pub(crate) fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn path(&self, role: PathRole) -> &Path {
        match role {
            PathRole::Source => &self.source,
            PathRole::Destination => &self.destination,
        }
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' -> '{}'", self.source.display(), self.destination.display())
    }
}

/// The last accepted pair as the caller stores it, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPaths {
    pub source: String,
    pub destination: String,
}

impl From<&SyncTarget> for SavedPaths {
    fn from(target: &SyncTarget) -> Self {
        Self {
            source: target.source.to_string_lossy().into_owned(),
            destination: target.destination.to_string_lossy().into_owned(),
        }
    }
}
