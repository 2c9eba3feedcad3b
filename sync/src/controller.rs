//! Lifecycle façade: guardrails first, then one worker per controller

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::events::{EventQueue, LogEvent};
use crate::mirror::{MirrorEngine, MirrorOptions};
use crate::target::{PathRole, SavedPaths, SyncTarget};
use crate::validator::{directory_verdict, PathValidator, ValidationVerdict};
use crate::worker::SyncWorker;

/// Default pause between two reconciles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Receives the accepted pair after every successful start, for pre-filling the next launch.
pub trait TargetStore: Send + Sync {
    fn save(&self, paths: &SavedPaths) -> anyhow::Result<()>;
}

/// Why a start request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("{role} {verdict}")]
    Rejected {
        role: PathRole,
        verdict: ValidationVerdict,
    },

    #[error("A sync session is already running")]
    AlreadyRunning,

    #[error("Failed to start sync worker: {0}")]
    Fatal(String),
}

impl StartError {
    pub fn verdict(&self) -> Option<ValidationVerdict> {
        match self {
            StartError::Rejected { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }

    /// True when the only objection is the save-path heuristic.
    pub fn needs_confirmation(&self) -> bool {
        self.verdict().is_some_and(ValidationVerdict::is_advisory)
    }

    fn rejected(role: PathRole, verdict: ValidationVerdict) -> Self {
        StartError::Rejected { role, verdict }
    }
}

/// Options for a controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub interval: Duration,
    pub validator: PathValidator,
    pub mirror: MirrorOptions,
    /// Pair accepted during a previous run
    pub last_paths: Option<SavedPaths>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            validator: PathValidator::from_env(),
            mirror: MirrorOptions::default(),
            last_paths: None,
        }
    }
}

/// The only entry point external collaborators use to run the engine.
pub struct SyncController {
    validator: PathValidator,
    interval: Duration,
    worker: SyncWorker,
    store: Option<Box<dyn TargetStore>>,
    last_paths: Option<SavedPaths>,
}

impl SyncController {
    pub fn new(options: ControllerOptions) -> Self {
        let worker = SyncWorker::new(MirrorEngine::new(options.mirror), EventQueue::new());

        Self {
            validator: options.validator,
            interval: options.interval,
            worker,
            store: None,
            last_paths: options.last_paths,
        }
    }

    /// Persist accepted pairs through `store`.
    pub fn with_store(mut self, store: impl TargetStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_paths(&self) -> Option<&SavedPaths> {
        self.last_paths.as_ref()
    }

    /// Run every guardrail without starting anything.
    ///
    /// Order: empty input, syntax, system directory, overlapping pair, source contents,
    /// destination contents, save-path heuristic. The string checks run before the filesystem
    /// is touched. Only the last one is skipped by `bypass_heuristic`.
    pub fn preflight(
        &self,
        source: &str,
        destination: &str,
        bypass_heuristic: bool,
    ) -> Result<SyncTarget, StartError> {
        let source = source.trim();
        let destination = destination.trim();

        for (role, path) in [(PathRole::Source, source), (PathRole::Destination, destination)] {
            if path.is_empty() {
                return Err(StartError::rejected(role, ValidationVerdict::EmptyOrMissing));
            }
        }

        for (role, path) in [(PathRole::Source, source), (PathRole::Destination, destination)] {
            if !self.validator.validate_syntax(path) {
                return Err(StartError::rejected(role, ValidationVerdict::InvalidSyntax));
            }
        }

        if self.validator.is_system_directory(destination) {
            return Err(StartError::rejected(PathRole::Destination, ValidationVerdict::SystemDirectory));
        }

        if self.validator.paths_overlap(source, destination) {
            return Err(StartError::rejected(PathRole::Destination, ValidationVerdict::OverlappingPaths));
        }

        for (role, path) in [(PathRole::Source, source), (PathRole::Destination, destination)] {
            let verdict = directory_verdict(Path::new(path));
            if !verdict.is_valid() {
                return Err(StartError::rejected(role, verdict));
            }
        }

        if !bypass_heuristic && !self.validator.looks_like_application_save_path(destination) {
            return Err(StartError::rejected(PathRole::Destination, ValidationVerdict::LikelyWrongTarget));
        }

        Ok(SyncTarget::new(source, destination))
    }

    /// Validate the pair and start mirroring it in the background.
    pub fn request_start(
        &mut self,
        source: &str,
        destination: &str,
        bypass_heuristic: bool,
    ) -> Result<(), StartError> {
        if self.worker.session().is_some() {
            return Err(StartError::AlreadyRunning);
        }

        let target = self.preflight(source, destination, bypass_heuristic).map_err(|e| {
            warn!("Sync start rejected: {}", e);
            e
        })?;

        if bypass_heuristic && !self.validator.looks_like_application_save_path(destination.trim()) {
            warn!("Save-path heuristic bypassed for {}", target.destination().display());
        }

        self.worker
            .start(target.clone(), self.interval)
            .map_err(|e| match e {
                SyncError::AlreadyRunning => StartError::AlreadyRunning,
                other => StartError::Fatal(other.to_string()),
            })?;

        let saved = SavedPaths::from(&target);
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&saved) {
                warn!("Failed to persist sync paths: {:#}", e);
                self.worker
                    .events()
                    .push(LogEvent::warning(format!("Could not save paths for next launch: {}", e)));
            }
        }
        self.last_paths = Some(saved);

        info!("Sync requested for {}", target);
        Ok(())
    }

    /// Stop the active worker, waiting for its loop to exit. Does nothing when idle.
    pub async fn request_stop(&mut self) {
        if self.worker.stop().await {
            info!("Sync stopped on request");
        }
    }

    /// Remove and return all events produced since the last drain.
    pub fn drain_events(&self) -> Vec<LogEvent> {
        self.worker.drain_events()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn active_target(&self) -> Option<&SyncTarget> {
        self.worker.session().map(|session| session.target())
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("interval", &self.interval)
            .field("worker", &self.worker)
            .field("has_store", &self.store.is_some())
            .field("last_paths", &self.last_paths)
            .finish()
    }
}
